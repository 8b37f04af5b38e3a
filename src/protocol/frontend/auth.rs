//! Authentication messages.

use std::fmt;

use crate::protocol::codec::write_cstr;

use super::{FrontendMessage, msg_type};

/// PasswordMessage carrying a cleartext or hashed credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Password<'a> {
    pub credential: &'a str,
}

impl FrontendMessage for Password<'_> {
    fn tag(&self) -> u8 {
        msg_type::PASSWORD
    }

    fn write_body(&self, buf: &mut Vec<u8>) {
        write_cstr(buf, self.credential);
    }
}

impl fmt::Display for Password<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password (packet): {} bytes, redacted", self.credential.len())
    }
}

impl fmt::Debug for Password<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password").finish_non_exhaustive()
    }
}

/// Compute MD5 password hash.
///
/// Format: "md5" + md5(hex(md5(password + username)) + salt)
pub fn md5_password(username: &str, password: &str, salt: &[u8; 4]) -> String {
    use md5::{Digest, Md5};

    // First hash: md5(password + username)
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(username.as_bytes());
    let first_hash_hex = format!("{:x}", hasher.finalize());

    // Second hash: md5(first_hash_hex + salt)
    let mut hasher = Md5::new();
    hasher.update(first_hash_hex.as_bytes());
    hasher.update(salt);

    format!("md5{:x}", hasher.finalize())
}

/// Compute SHA-512 password hash.
///
/// Format: "sha512" + sha512(hex(sha512(password + user_salt)) + salt)
pub fn sha512_password(password: &str, user_salt: &[u8], salt: &[u8; 4]) -> String {
    use sha2::{Digest, Sha512};

    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    hasher.update(user_salt);
    let first_hash_hex = format!("{:x}", hasher.finalize());

    let mut hasher = Sha512::new();
    hasher.update(first_hash_hex.as_bytes());
    hasher.update(salt);

    format!("sha512{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_vector() {
        assert_eq!(
            md5_password("dbadmin", "abc", &[0x01, 0x02, 0x03, 0x04]),
            "md5b2e81486995d83caa0364d5d0892d166"
        );
        assert_eq!(
            md5_password("dbadmin", "", &[9, 9, 9, 9]),
            "md567f3c850c0a7c5f32efebe3799992832"
        );
    }

    #[test]
    fn sha512_vector() {
        assert_eq!(
            sha512_password("abc", b"usersalt", &[0x01, 0x02, 0x03, 0x04]),
            "sha512f0e3c2472c46f2f495fb26a7888f841a5bba772a083b4872bc13b385ada31002d65314d9b44c6f2bc5e23ac3e626ac5cb81ae25c9f6729a0934e1a2a4db9fb61"
        );
    }

    #[test]
    fn password_message() {
        let mut buf = Vec::new();
        Password { credential: "secret" }.write_frame(&mut buf);

        assert_eq!(buf[0], b'p');
        assert_eq!(&buf[1..5], &11_u32.to_be_bytes());
        assert_eq!(&buf[5..], b"secret\0");
    }

    #[test]
    fn password_is_never_described() {
        let msg = Password { credential: "hunter2" };
        assert!(!msg.to_string().contains("hunter2"));
        assert!(!format!("{msg:?}").contains("hunter2"));
    }
}
