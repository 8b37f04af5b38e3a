//! Authentication-related backend messages.

use zerocopy::byteorder::big_endian::U32 as U32BE;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::{MessageBuilder, expect_end, read_cstr, read_i32, read_u8};
use crate::protocol::types::TransactionStatus;

use super::msg_type;

/// Authentication method codes.
pub mod auth_type {
    pub const OK: i32 = 0;
    pub const KERBEROS_V5: i32 = 2;
    pub const CLEARTEXT_PASSWORD: i32 = 3;
    pub const CRYPT_PASSWORD: i32 = 4;
    pub const MD5_PASSWORD: i32 = 5;
    pub const SCM_CREDENTIAL: i32 = 6;
    pub const GSS: i32 = 7;
    pub const GSS_CONTINUE: i32 = 8;
    pub const SSPI: i32 = 9;
    pub const HASH: i32 = 65536;
    pub const HASH_MD5: i32 = HASH + 5;
    pub const SHA512_PASSWORD: i32 = HASH + 512;
}

/// Authentication request from the server: a method code plus
/// method-specific salt material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authentication<'a> {
    /// Method code (see [`auth_type`])
    pub code: i32,
    /// Everything after the code
    pub extra: &'a [u8],
}

/// A decoded authentication request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChallenge<'a> {
    /// Authentication successful
    Ok,
    /// Send the password as-is
    CleartextPassword,
    /// Two-round MD5 with a 4-byte salt
    Md5Password { salt: [u8; 4] },
    /// Two-round SHA-512: `salt` salts the second round, `user_salt` the first
    Sha512Password { salt: [u8; 4], user_salt: &'a [u8] },
    /// Anything else
    Unsupported(i32),
}

impl<'a> Authentication<'a> {
    /// Parse an Authentication message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (code, extra) = read_i32(payload)?;
        Ok(Self { code, extra })
    }

    /// Interpret the code and slice out the salt material it calls for.
    ///
    /// Layout of `extra`: bytes `0..4` are the per-session salt; for SHA-512,
    /// bytes `4..8` are a length word and the user salt starts at byte 8.
    pub fn challenge(&self) -> Result<AuthChallenge<'a>> {
        match self.code {
            auth_type::OK => Ok(AuthChallenge::Ok),
            auth_type::CLEARTEXT_PASSWORD => Ok(AuthChallenge::CleartextPassword),
            auth_type::MD5_PASSWORD | auth_type::HASH_MD5 => Ok(AuthChallenge::Md5Password {
                salt: self.salt()?,
            }),
            auth_type::SHA512_PASSWORD => {
                let salt = self.salt()?;
                let user_salt = self.extra.get(8..).ok_or_else(|| {
                    Error::Protocol(format!(
                        "SHA512Password: extra data too short: {} < 8",
                        self.extra.len()
                    ))
                })?;
                Ok(AuthChallenge::Sha512Password { salt, user_salt })
            }
            code => Ok(AuthChallenge::Unsupported(code)),
        }
    }

    fn salt(&self) -> Result<[u8; 4]> {
        self.extra
            .first_chunk::<4>()
            .copied()
            .ok_or_else(|| Error::Protocol(format!("Authentication {}: missing salt", self.code)))
    }

    /// Write this message as a backend frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageBuilder::new(buf, msg_type::AUTHENTICATION);
        msg.write_i32(self.code);
        msg.write_bytes(self.extra);
        msg.finish();
    }
}

impl std::fmt::Display for Authentication<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.code {
            auth_type::OK => "Ok",
            auth_type::KERBEROS_V5 => "KerberosV5",
            auth_type::CLEARTEXT_PASSWORD => "CleartextPassword",
            auth_type::CRYPT_PASSWORD => "CryptPassword",
            auth_type::MD5_PASSWORD => "MD5Password",
            auth_type::SCM_CREDENTIAL => "SCMCredential",
            auth_type::GSS => "GSS",
            auth_type::GSS_CONTINUE => "GSSContinue",
            auth_type::SSPI => "SSPI",
            auth_type::HASH => "Hash",
            auth_type::HASH_MD5 => "HashMD5",
            auth_type::SHA512_PASSWORD => "SHA512Password",
            _ => "Unknown",
        };
        write!(
            f,
            "Authentication: {} (code={}, {} extra bytes)",
            name,
            self.code,
            self.extra.len()
        )
    }
}

/// BackendKeyData message - contains process ID and secret key for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct BackendKeyData {
    /// Process ID of the backend
    pub pid: U32BE,
    /// Secret key for cancellation
    pub secret_key: U32BE,
}

impl BackendKeyData {
    /// Build from native values.
    pub fn new(pid: u32, secret_key: u32) -> Self {
        Self {
            pid: U32BE::new(pid),
            secret_key: U32BE::new(secret_key),
        }
    }

    /// Parse a BackendKeyData message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<&Self> {
        Ok(Self::ref_from_bytes(payload)?)
    }

    /// Get the process ID.
    pub fn process_id(&self) -> u32 {
        self.pid.get()
    }

    /// Get the secret key.
    pub fn secret(&self) -> u32 {
        self.secret_key.get()
    }

    /// Write this message as a backend frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageBuilder::new(buf, msg_type::BACKEND_KEY_DATA);
        msg.write_bytes(self.as_bytes());
        msg.finish();
    }
}

/// ParameterStatus message - server parameter name and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterStatus<'a> {
    /// Parameter name
    pub name: &'a str,
    /// Parameter value
    pub value: &'a str,
}

impl<'a> ParameterStatus<'a> {
    /// Parse a ParameterStatus message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (name, rest) = read_cstr(payload)?;
        let (value, rest) = read_cstr(rest)?;
        expect_end(rest, "ParameterStatus")?;
        Ok(Self { name, value })
    }

    /// Write this message as a backend frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageBuilder::new(buf, msg_type::PARAMETER_STATUS);
        msg.write_cstr(self.name);
        msg.write_cstr(self.value);
        msg.finish();
    }
}

/// ReadyForQuery message - indicates server is ready for a new query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyForQuery {
    /// Transaction status reported by the server
    pub status: TransactionStatus,
}

impl ReadyForQuery {
    /// Parse a ReadyForQuery message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (byte, rest) = read_u8(payload)?;
        expect_end(rest, "ReadyForQuery")?;
        let status = TransactionStatus::from_byte(byte).ok_or_else(|| {
            Error::Protocol(format!(
                "ReadyForQuery: unknown transaction status '{}'",
                byte.escape_ascii()
            ))
        })?;
        Ok(Self { status })
    }

    /// Get the transaction status.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.status
    }

    /// Write this message as a backend frame.
    pub fn write(&self, buf: &mut Vec<u8>) {
        let mut msg = MessageBuilder::new(buf, msg_type::READY_FOR_QUERY);
        msg.write_u8(self.status.as_byte());
        msg.finish();
    }
}
