use crate::error::{BookingError, Result};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::marker::PhantomData;

/// Reads typed seed records from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// so optional trailing columns (such as `points` or `status`) may be left
/// out and fall back to their serde defaults.
pub struct RecordReader<R: Read, T> {
    reader: csv::Reader<R>,
    _record: PhantomData<T>,
}

impl<R: Read, T: DeserializeOwned> RecordReader<R, T> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self {
            reader,
            _record: PhantomData,
        }
    }

    /// Lazily deserializes one record per row.
    pub fn records(self) -> impl Iterator<Item = Result<T>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BookingError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::availability::AvailabilityWindow;
    use crate::domain::user::User;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "id, email, first_name, last_name\n\
                    7f1c1d8e-3f5a-4c1e-9a51-1b2a3c4d5e6f, ada@example.com, Ada, Obi";
        let results: Vec<Result<User>> = RecordReader::new(data.as_bytes()).records().collect();

        assert_eq!(results.len(), 1);
        let user = results[0].as_ref().unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.points, 0);
    }

    #[test]
    fn test_reader_parses_windows() {
        let data = "id,listing_id,start_date,end_date,price_per_night,is_blocked\n\
                    0b8e6a8c-7d59-4c44-8d4c-1f2e3d4c5b6a,5d2c1b0a-9e8f-4a7b-8c6d-5e4f3a2b1c0d,\
                    2024-04-01T00:00:00Z,2024-04-30T00:00:00Z,100,false";
        let windows: Vec<AvailabilityWindow> = RecordReader::new(data.as_bytes())
            .records()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(windows[0].price_per_night, dec!(100));
        assert!(!windows[0].is_blocked);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "id, email, first_name, last_name\nnot-a-uuid, a@b.c, A, B";
        let results: Vec<Result<User>> = RecordReader::new(data.as_bytes()).records().collect();

        assert!(matches!(results[0], Err(BookingError::Csv(_))));
    }
}
