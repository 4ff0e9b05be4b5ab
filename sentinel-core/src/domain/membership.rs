//! Membership events: immutable rows of the index history log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of a membership transition.
///
/// Older history files spell these `IN` / `OUT`; both are accepted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "JOIN", alias = "IN")]
    Join,
    #[serde(rename = "LEAVE", alias = "OUT")]
    Leave,
}

/// One row of `index_history.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEvent {
    pub code: String,
    pub index_name: String,
    pub event_type: EventType,
    pub event_date: NaiveDate,
}

impl MembershipEvent {
    pub fn join(code: impl Into<String>, index_name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            code: code.into(),
            index_name: index_name.into(),
            event_type: EventType::Join,
            event_date: date,
        }
    }

    pub fn leave(code: impl Into<String>, index_name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            code: code.into(),
            index_name: index_name.into(),
            event_type: EventType::Leave,
            event_date: date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_in_out_spellings_are_read() {
        let data = "code,index_name,event_type,event_date\n\
                    7203.T,Nikkei225,IN,2024-01-05\n\
                    6758.T,Nikkei225,OUT,2024-02-01\n\
                    9984.T,Nikkei225,JOIN,2024-02-01\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let events: Vec<MembershipEvent> =
            reader.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(events[0].event_type, EventType::Join);
        assert_eq!(events[1].event_type, EventType::Leave);
        assert_eq!(events[2].event_type, EventType::Join);
    }

    #[test]
    fn writes_canonical_spelling() {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer
            .serialize(MembershipEvent::leave(
                "7203.T",
                "Nikkei225",
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ))
            .unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert!(out.contains("7203.T,Nikkei225,LEAVE,2024-03-01"));
    }
}
