use pg_grab_shared::{CmdType, Datum, Oid};

use super::instrument::StatementTiming;
use super::logger::LogLayout;
use super::params::RenderedParams;

/// Snapshot of one executed statement, built at statement end and turned
/// into exactly one log row.
#[derive(Clone, Debug, PartialEq)]
pub struct StatementEvent {
    pub transaction_id: u32,
    pub command_id: u32,
    pub process_id: i32,
    pub user_id: Oid,
    pub timing: Option<StatementTiming>,
    pub command_type: CmdType,
    pub source_text: String,
    pub params: Option<RenderedParams>,
}

impl StatementEvent {
    /// Column values in the order `layout` defines.
    pub fn into_row(self, layout: LogLayout) -> Vec<Option<Datum>> {
        let (start_timestamp, elapsed_seconds) = match self.timing {
            Some(timing) => (
                Some(Datum::TimestampTz(timing.start_timestamp)),
                Some(Datum::Float8(timing.elapsed_seconds)),
            ),
            None => (None, None),
        };

        let mut row = vec![
            Some(Datum::Int8(i64::from(self.transaction_id))),
            Some(Datum::Int8(i64::from(self.command_id))),
            Some(Datum::Int4(self.process_id)),
            Some(Datum::Int8(i64::from(self.user_id.0))),
            start_timestamp,
            elapsed_seconds,
        ];

        match layout {
            LogLayout::TypedArrays => {
                row.push(Some(Datum::Int4(self.command_type.id())));
                row.push(Some(Datum::Text(self.source_text)));
                match self.params {
                    Some(params) => {
                        let (values, types) = params.to_arrays();
                        row.push(Some(Datum::TextArray(values)));
                        row.push(Some(Datum::RegTypeArray(types)));
                    }
                    None => {
                        row.push(None);
                        row.push(None);
                    }
                }
            }
            LogLayout::Delimited => {
                row.push(Some(Datum::Text(self.source_text)));
                row.push(self.params.map(|p| Datum::Text(p.to_delimited())));
            }
        }

        row
    }
}
