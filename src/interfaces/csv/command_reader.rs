use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Provision,
    Fund,
    Transfer,
}

/// One row of a command script: `op, owner, counterparty, amount`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub op: CommandKind,
    /// Email of the acting owner (the source, for transfers).
    pub owner: String,
    /// Email of the receiving owner, for transfers.
    pub counterparty: Option<String>,
    pub amount: Option<Decimal>,
}

/// Reads wallet commands from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<CommandRecord, csv::Error>`. It handles whitespace trimming and
/// flexible record lengths automatically.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes commands.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRecord, csv::Error>> {
        self.reader.into_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, owner, counterparty, amount\n\
                    provision, a@x.com, ,\n\
                    fund, a@x.com, , 1000\n\
                    transfer, a@x.com, b@x.com, 300.50";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<_> = reader.commands().collect();

        assert_eq!(results.len(), 3);
        let provision = results[0].as_ref().unwrap();
        assert_eq!(provision.op, CommandKind::Provision);
        assert_eq!(provision.counterparty, None);
        assert_eq!(provision.amount, None);

        let transfer = results[2].as_ref().unwrap();
        assert_eq!(transfer.op, CommandKind::Transfer);
        assert_eq!(transfer.counterparty.as_deref(), Some("b@x.com"));
        assert_eq!(transfer.amount, Some(dec!(300.50)));
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "op, owner, counterparty, amount\n\
                    withdraw, a@x.com, , 1.0\n\
                    fund, a@x.com, , lots";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<_> = reader.commands().collect();

        assert!(results[0].is_err());
        assert!(results[1].is_err());
    }
}
