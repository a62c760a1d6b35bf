//! Command model for the register window.
//!
//! The wire traffic is a closed set: one parameter shape and one reply
//! shape per command id. Malformed parameter payloads decode to
//! [`CommandParams::Malformed`] and are carried through rather than
//! failing the command.

use cartlink_codec::{decode_record, encode_record, CodecResult, Value};

/// Command identifiers accepted by the trigger register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandId {
    /// Report available/total storage capacity.
    QueryAvailableSpace = 0x01,
    /// Force a foreground synchronization.
    SyncSaveData = 0x02,
    /// Generate and store a simulated custom content payload.
    RequestCustomContent = 0x03,
    /// Generate and store a simulated extended asset.
    LoadExtendedAsset = 0x04,
    /// Accept a telemetry payload.
    UploadTelemetry = 0x05,
    /// Fetch a deterministic leaderboard.
    GetLeaderboard = 0x06,
}

impl CommandId {
    /// Decodes a raw command byte.
    #[must_use]
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::QueryAvailableSpace),
            0x02 => Some(Self::SyncSaveData),
            0x03 => Some(Self::RequestCustomContent),
            0x04 => Some(Self::LoadExtendedAsset),
            0x05 => Some(Self::UploadTelemetry),
            0x06 => Some(Self::GetLeaderboard),
            _ => None,
        }
    }

    /// The raw command byte.
    #[must_use]
    pub fn raw(self) -> u8 {
        self as u8
    }
}

/// Decoded command parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandParams {
    /// No parameters (or none expected).
    None,
    /// Parameters for [`CommandId::RequestCustomContent`].
    CustomContent {
        /// Requested content identifier. Missing ids default to 0.
        content_id: i64,
    },
    /// Parameters for [`CommandId::LoadExtendedAsset`].
    ExtendedAsset {
        /// Requested asset identifier. Missing ids default to 0.
        asset_id: i64,
    },
    /// Parameters for [`CommandId::UploadTelemetry`].
    Telemetry {
        /// The uploaded payload, as decoded.
        payload: Value,
    },
    /// Parameters for [`CommandId::GetLeaderboard`].
    Leaderboard {
        /// Requested board identifier. Missing ids default to 0.
        board_id: i64,
    },
    /// The payload did not decode as record text; the raw bytes are kept.
    Malformed {
        /// The undecodable payload bytes.
        raw: Vec<u8>,
    },
}

impl CommandParams {
    /// Decodes a parameter payload for the given command. `None` means the
    /// trigger carried no parameter pointer.
    #[must_use]
    pub fn decode(id: CommandId, payload: Option<&[u8]>) -> Self {
        let value = match payload {
            None => None,
            Some(bytes) => match decode_record(bytes) {
                Ok(value) => Some(value),
                Err(_) => {
                    return Self::Malformed {
                        raw: bytes.to_vec(),
                    }
                }
            },
        };

        match id {
            CommandId::QueryAvailableSpace | CommandId::SyncSaveData => Self::None,
            CommandId::RequestCustomContent => Self::CustomContent {
                content_id: integer_field(value.as_ref(), "content_id"),
            },
            CommandId::LoadExtendedAsset => Self::ExtendedAsset {
                asset_id: integer_field(value.as_ref(), "asset_id"),
            },
            CommandId::UploadTelemetry => Self::Telemetry {
                payload: value.unwrap_or(Value::Null),
            },
            CommandId::GetLeaderboard => Self::Leaderboard {
                board_id: integer_field(value.as_ref(), "board_id"),
            },
        }
    }
}

fn integer_field(value: Option<&Value>, key: &str) -> i64 {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_integer)
        .unwrap_or(0)
}

/// Wire error codes carried in error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// No session could be established.
    NotConnected,
    /// The trigger carried an unrecognized command id.
    UnknownCommand,
    /// A store was rejected by the quota.
    QuotaExceeded,
    /// The requested path does not exist.
    NotFound,
    /// Any other failure.
    Internal,
}

impl ErrorCode {
    /// The code string written into error replies.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: i64,
    /// Display name.
    pub name: String,
    /// Score, descending with rank.
    pub score: i64,
    /// Unix timestamp of the entry.
    pub timestamp: i64,
}

/// Structured command results.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    /// Reply to [`CommandId::QueryAvailableSpace`].
    AvailableSpace {
        /// Bytes still available under the quota.
        available: u64,
        /// Total quota in bytes.
        total: u64,
    },
    /// Reply to [`CommandId::SyncSaveData`].
    SyncComplete {
        /// Unix timestamp of the completed sync.
        last_sync: u64,
    },
    /// Reply to [`CommandId::RequestCustomContent`].
    ContentReady {
        /// Echoed content identifier.
        content_id: i64,
        /// Generated payload size in bytes.
        size: u64,
        /// Storage path holding the payload.
        path: String,
    },
    /// Reply to [`CommandId::LoadExtendedAsset`].
    AssetReady {
        /// Echoed asset identifier.
        asset_id: i64,
        /// Generated payload size in bytes.
        size: u64,
    },
    /// Reply to [`CommandId::UploadTelemetry`].
    TelemetryAccepted,
    /// Reply to [`CommandId::GetLeaderboard`].
    Leaderboard {
        /// Echoed board identifier.
        board_id: i64,
        /// Ranked entries, best first.
        entries: Vec<LeaderboardEntry>,
    },
    /// Any failure, carrying its wire code.
    Error {
        /// The failure classification.
        code: ErrorCode,
    },
}

impl CommandReply {
    /// Shorthand for an error reply.
    #[must_use]
    pub fn error(code: ErrorCode) -> Self {
        Self::Error { code }
    }

    /// Whether this reply reports success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    /// The record written into the response area. Every reply carries a
    /// `status` field; errors add a `code` string.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let status = if self.is_success() { "success" } else { "error" };
        let mut fields: Vec<(String, Value)> =
            vec![("status".into(), Value::Text(status.into()))];
        match self {
            Self::AvailableSpace { available, total } => {
                fields.push(("available".into(), Value::Integer(*available as i64)));
                fields.push(("total".into(), Value::Integer(*total as i64)));
            }
            Self::SyncComplete { last_sync } => {
                fields.push(("last_sync".into(), Value::Integer(*last_sync as i64)));
            }
            Self::ContentReady {
                content_id,
                size,
                path,
            } => {
                fields.push(("content_id".into(), Value::Integer(*content_id)));
                fields.push(("size".into(), Value::Integer(*size as i64)));
                fields.push(("path".into(), Value::Text(path.clone())));
            }
            Self::AssetReady { asset_id, size } => {
                fields.push(("asset_id".into(), Value::Integer(*asset_id)));
                fields.push(("size".into(), Value::Integer(*size as i64)));
            }
            Self::TelemetryAccepted => {
                fields.push(("received".into(), Value::Bool(true)));
            }
            Self::Leaderboard { board_id, entries } => {
                fields.push(("board_id".into(), Value::Integer(*board_id)));
                fields.push(("count".into(), Value::Integer(entries.len() as i64)));
                let rows = entries
                    .iter()
                    .map(|entry| {
                        Value::record(vec![
                            ("rank".into(), Value::Integer(entry.rank)),
                            ("name".into(), Value::Text(entry.name.clone())),
                            ("score".into(), Value::Integer(entry.score)),
                            ("timestamp".into(), Value::Integer(entry.timestamp)),
                        ])
                    })
                    .collect();
                fields.push(("entries".into(), Value::List(rows)));
            }
            Self::Error { code } => {
                fields.push(("code".into(), Value::Text(code.as_str().into())));
            }
        }
        Value::record(fields)
    }

    /// Serializes the reply to record text.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        encode_record(&self.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_ids_roundtrip() {
        for raw in 0x01..=0x06u8 {
            let id = CommandId::from_raw(raw).unwrap();
            assert_eq!(id.raw(), raw);
        }
        assert_eq!(CommandId::from_raw(0x00), None);
        assert_eq!(CommandId::from_raw(0x07), None);
        assert_eq!(CommandId::from_raw(0xff), None);
    }

    #[test]
    fn params_decode_with_defaults() {
        let params = CommandParams::decode(CommandId::RequestCustomContent, None);
        assert_eq!(params, CommandParams::CustomContent { content_id: 0 });

        let record = Value::record(vec![("content_id".into(), Value::Integer(7))]);
        let bytes = encode_record(&record).unwrap();
        let params = CommandParams::decode(CommandId::RequestCustomContent, Some(&bytes));
        assert_eq!(params, CommandParams::CustomContent { content_id: 7 });
    }

    #[test]
    fn malformed_payloads_are_preserved() {
        let garbage = b"\xff\xfenot record text";
        let params = CommandParams::decode(CommandId::UploadTelemetry, Some(garbage));
        assert_eq!(
            params,
            CommandParams::Malformed {
                raw: garbage.to_vec()
            }
        );
    }

    #[test]
    fn success_reply_carries_status() {
        let reply = CommandReply::AvailableSpace {
            available: 10,
            total: 100,
        };
        let value = reply.to_value();
        assert_eq!(value.get("status").and_then(Value::as_text), Some("success"));
        assert_eq!(value.get("available").and_then(Value::as_integer), Some(10));
        assert_eq!(value.get("total").and_then(Value::as_integer), Some(100));
    }

    #[test]
    fn error_reply_carries_code() {
        let reply = CommandReply::error(ErrorCode::UnknownCommand);
        let value = reply.to_value();
        assert_eq!(value.get("status").and_then(Value::as_text), Some("error"));
        assert_eq!(
            value.get("code").and_then(Value::as_text),
            Some("UNKNOWN_COMMAND")
        );
    }

    #[test]
    fn leaderboard_reply_lists_entries() {
        let reply = CommandReply::Leaderboard {
            board_id: 3,
            entries: vec![LeaderboardEntry {
                rank: 1,
                name: "Player104".into(),
                score: 9500,
                timestamp: 1_700_000_000,
            }],
        };
        let value = reply.to_value();
        assert_eq!(value.get("count").and_then(Value::as_integer), Some(1));
        let entries = value.get("entries").and_then(Value::as_list).unwrap();
        assert_eq!(
            entries[0].get("name").and_then(Value::as_text),
            Some("Player104")
        );
    }

    #[test]
    fn replies_encode_to_record_text() {
        let reply = CommandReply::SyncComplete {
            last_sync: 1_756_000_000,
        };
        let bytes = reply.encode().unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(decoded, reply.to_value());
    }
}
