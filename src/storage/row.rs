//! The one row shape this store knows: `(id, username, email)`.

use crate::errors::Error;
use std::fmt;

/// Size of the `id` column (u32, little-endian).
pub const ID_SIZE: usize = std::mem::size_of::<u32>();

/// Size of the `username` field on disk: 32 content bytes plus a NUL.
pub const USERNAME_SIZE: usize = 33;

/// Size of the `email` field on disk: 255 content bytes plus a NUL.
pub const EMAIL_SIZE: usize = 256;

pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Serialized size of a full row.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

/// Longest username accepted, in bytes.
pub const USERNAME_MAX_LEN: usize = USERNAME_SIZE - 1;

/// Longest email accepted, in bytes.
pub const EMAIL_MAX_LEN: usize = EMAIL_SIZE - 1;

/// A row of the fixed `(id, username, email)` schema. `id` doubles as the
/// primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    /// Builds a row, rejecting over-long text fields.
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, Error> {
        if username.len() > USERNAME_MAX_LEN || email.len() > EMAIL_MAX_LEN {
            return Err(Error::StringTooLong);
        }
        Ok(Row {
            id,
            username: username.to_owned(),
            email: email.to_owned(),
        })
    }

    /// Packs the row into its 293-byte on-disk form. Text fields are
    /// NUL-padded to their fixed width.
    pub fn serialize(&self) -> [u8; ROW_SIZE] {
        debug_assert!(self.username.len() <= USERNAME_MAX_LEN);
        debug_assert!(self.email.len() <= EMAIL_MAX_LEN);
        let mut buf = [0u8; ROW_SIZE];
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        let username = self.username.as_bytes();
        buf[USERNAME_OFFSET..USERNAME_OFFSET + username.len()].copy_from_slice(username);
        let email = self.email.as_bytes();
        buf[EMAIL_OFFSET..EMAIL_OFFSET + email.len()].copy_from_slice(email);
        buf
    }

    /// Unpacks a 293-byte on-disk value back into a row.
    pub fn deserialize(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() != ROW_SIZE {
            return Err(err!(
                Storage,
                "row size mismatch (expected {}, got {})",
                ROW_SIZE,
                buf.len()
            ));
        }
        let mut id_bytes = [0u8; ID_SIZE];
        id_bytes.copy_from_slice(&buf[ID_OFFSET..ID_OFFSET + ID_SIZE]);
        Ok(Row {
            id: u32::from_le_bytes(id_bytes),
            username: decode_text(&buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]),
            email: decode_text(&buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]),
        })
    }
}

/// Drops the NUL padding from a fixed-width text field.
fn decode_text(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_end_matches('\0')
        .to_string()
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        assert_eq!(ROW_SIZE, 293);
        assert_eq!(USERNAME_OFFSET, 4);
        assert_eq!(EMAIL_OFFSET, 37);
    }

    #[test]
    fn round_trip() {
        let row = Row::new(1, "user1", "person1@example.com").unwrap();
        let decoded = Row::deserialize(&row.serialize()).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn round_trip_at_max_field_lengths() {
        let username = "u".repeat(USERNAME_MAX_LEN);
        let email = "e".repeat(EMAIL_MAX_LEN);
        let row = Row::new(42, &username, &email).unwrap();
        let decoded = Row::deserialize(&row.serialize()).unwrap();
        assert_eq!(decoded.username, username);
        assert_eq!(decoded.email, email);
    }

    #[test]
    fn one_byte_past_the_limit_is_rejected() {
        let err = Row::new(1, &"u".repeat(USERNAME_MAX_LEN + 1), "e").unwrap_err();
        assert!(matches!(err, Error::StringTooLong));
        let err = Row::new(1, "u", &"e".repeat(EMAIL_MAX_LEN + 1)).unwrap_err();
        assert!(matches!(err, Error::StringTooLong));
    }

    #[test]
    fn deserialize_rejects_wrong_length() {
        let err = Row::deserialize(&[0u8; ROW_SIZE - 1]).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn display_matches_select_output() {
        let row = Row::new(7, "alice", "alice@x").unwrap();
        assert_eq!(row.to_string(), "(7, alice, alice@x)");
    }
}
