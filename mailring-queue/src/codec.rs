use mailring_common::Batch;

use crate::{Entry, SerializationError};

/// Encode a batch for storage
///
/// # Errors
/// If bincode cannot serialize the batch
pub fn encode(batch: &Batch) -> Result<Entry, SerializationError> {
    Ok(bincode::serde::encode_to_vec(
        batch,
        bincode::config::standard(),
    )?)
}

/// Decode a stored entry back into a batch
///
/// # Errors
/// If the bytes are not a complete encoded batch
pub fn decode(entry: &[u8]) -> Result<Batch, SerializationError> {
    let (batch, read) =
        bincode::serde::decode_from_slice::<Batch, _>(entry, bincode::config::standard())?;

    if read == entry.len() {
        Ok(batch)
    } else {
        Err(SerializationError::Corrupted(format!(
            "{} trailing bytes after batch {}",
            entry.len() - read,
            batch.id
        )))
    }
}

/// Encode several batches, preserving order
///
/// # Errors
/// If any batch fails to serialize
pub fn encode_all<'a>(
    batches: impl IntoIterator<Item = &'a Batch>,
) -> Result<Vec<Entry>, SerializationError> {
    batches.into_iter().map(encode).collect()
}

#[cfg(test)]
mod tests {
    use mailring_common::{Address, Message};

    use super::*;

    fn batch() -> Batch {
        let message = Message::builder()
            .sender(Address::new("from@example.com"))
            .receiver(Address::new("a@example.com").with_name("A"))
            .receiver(Address::new("b@example.com"))
            .subject("Hi {{name}}")
            .text("Hello")
            .build();

        Batch::new(message.normalised())
    }

    #[test]
    fn decodes_what_it_encodes() {
        let batch = batch();
        let entry = encode(&batch).unwrap();

        assert_eq!(decode(&entry).unwrap(), batch);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode(b"\xff\xff\xff").is_err());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut entry = encode(&batch()).unwrap();
        entry.push(0);

        assert!(matches!(
            decode(&entry),
            Err(SerializationError::Corrupted(_))
        ));
    }
}
