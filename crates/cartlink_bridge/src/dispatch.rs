//! Command dispatcher.
//!
//! Turns a decoded trigger into a storage/session operation and a
//! structured reply. A dispatch against a disconnected link attempts one
//! implicit connect before giving up with `NOT_CONNECTED`.

use crate::command::{CommandId, CommandParams, CommandReply, ErrorCode, LeaderboardEntry};
use cartlink_codec::Value;
use cartlink_session::{Link, LinkError, LinkResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fixed epoch for synthetic leaderboard timestamps, so equal board ids
/// always produce identical rows.
const LEADERBOARD_EPOCH: i64 = 1_700_000_000;

/// Executes commands against a shared [`Link`].
pub struct Dispatcher {
    link: Arc<Link>,
}

impl Dispatcher {
    /// Creates a dispatcher bound to `link`.
    #[must_use]
    pub fn new(link: Arc<Link>) -> Self {
        Self { link }
    }

    /// Executes the command identified by `raw_id`. Never fails: every
    /// outcome is a [`CommandReply`].
    pub fn dispatch(&self, raw_id: u8, params: CommandParams) -> CommandReply {
        let Some(id) = CommandId::from_raw(raw_id) else {
            warn!(raw_id, "unknown command id");
            return CommandReply::error(ErrorCode::UnknownCommand);
        };

        if !self.link.is_connected() && self.link.connect().is_err() {
            warn!(command = ?id, "implicit connect failed");
            return CommandReply::error(ErrorCode::NotConnected);
        }

        debug!(command = ?id, "dispatching");
        match self.run(id, params) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(command = ?id, error = %e, "command failed");
                CommandReply::error(error_code(&e))
            }
        }
    }

    fn run(&self, id: CommandId, params: CommandParams) -> LinkResult<CommandReply> {
        match id {
            CommandId::QueryAvailableSpace => {
                let stats = self.link.stats();
                Ok(CommandReply::AvailableSpace {
                    available: stats.available_bytes,
                    total: stats.capacity,
                })
            }
            CommandId::SyncSaveData => {
                let last_sync = self.link.force_sync()?;
                Ok(CommandReply::SyncComplete { last_sync })
            }
            CommandId::RequestCustomContent => {
                let content_id = match params {
                    CommandParams::CustomContent { content_id } => content_id,
                    _ => 0,
                };
                self.request_custom_content(content_id)
            }
            CommandId::LoadExtendedAsset => {
                let asset_id = match params {
                    CommandParams::ExtendedAsset { asset_id } => asset_id,
                    _ => 0,
                };
                self.load_extended_asset(asset_id)
            }
            CommandId::UploadTelemetry => {
                if let CommandParams::Malformed { raw } = &params {
                    debug!(bytes = raw.len(), "telemetry payload was not record text");
                }
                Ok(CommandReply::TelemetryAccepted)
            }
            CommandId::GetLeaderboard => {
                let board_id = match params {
                    CommandParams::Leaderboard { board_id } => board_id,
                    _ => 0,
                };
                Ok(CommandReply::Leaderboard {
                    board_id,
                    entries: leaderboard_entries(board_id),
                })
            }
        }
    }

    /// Generates a deterministic pseudo-random content payload and stores
    /// it under the custom-level namespace.
    fn request_custom_content(&self, content_id: i64) -> LinkResult<CommandReply> {
        let size = 16_384 + bounded_id(content_id) * 1_024;
        let level = Value::record(vec![
            ("content_id".into(), Value::Integer(content_id)),
            ("data".into(), Value::Bytes(generated_bytes(content_id, size))),
        ]);
        let name = format!("content_{content_id}");
        self.link.service().store_custom_level(&name, level)?;
        Ok(CommandReply::ContentReady {
            content_id,
            size: size as u64,
            path: format!("extended_levels/{name}"),
        })
    }

    /// Generates a deterministic asset payload and stores it under the
    /// asset namespace.
    fn load_extended_asset(&self, asset_id: i64) -> LinkResult<CommandReply> {
        let size = 4_096 + bounded_id(asset_id) * 256;
        let asset = Value::record(vec![
            ("asset_id".into(), Value::Integer(asset_id)),
            ("data".into(), Value::Bytes(generated_bytes(asset_id, size))),
        ]);
        let path = format!("extended_assets/asset_{asset_id}");
        self.link.service().store(&path, asset)?;
        Ok(CommandReply::AssetReady {
            asset_id,
            size: size as u64,
        })
    }
}

fn error_code(e: &LinkError) -> ErrorCode {
    match e {
        LinkError::NotConnected | LinkError::ConnectionRefused => ErrorCode::NotConnected,
        _ if e.is_quota_exceeded() => ErrorCode::QuotaExceeded,
        _ if e.is_not_found() => ErrorCode::NotFound,
        _ => ErrorCode::Internal,
    }
}

/// Maps an arbitrary id into the documented size formula's operand range.
fn bounded_id(id: i64) -> usize {
    id.rem_euclid(256) as usize
}

/// Deterministic payload bytes: equal ids always generate equal content.
fn generated_bytes(id: i64, size: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(id as u64);
    let mut bytes = vec![0u8; size];
    rng.fill(bytes.as_mut_slice());
    bytes
}

/// `10 + board_id % 10` ranked rows, fully derived from the board id.
fn leaderboard_entries(board_id: i64) -> Vec<LeaderboardEntry> {
    let count = 10 + board_id.rem_euclid(10);
    let mut rng = StdRng::seed_from_u64(board_id as u64);
    let mut score = 10_000i64;
    (1..=count)
        .map(|rank| {
            score -= rng.gen_range(50..200);
            LeaderboardEntry {
                rank,
                name: format!("Player{}", rng.gen_range(100..1000)),
                score,
                timestamp: LEADERBOARD_EPOCH - rank * 3_600,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartlink_session::LinkConfig;

    fn dispatcher() -> Dispatcher {
        let link = Link::new(
            LinkConfig::new("dispatch_test")
                .immediate()
                .with_rng_seed(17)
                .with_autosave_probability(0.0)
                .with_incident_probability(0.0),
        );
        Dispatcher::new(Arc::new(link))
    }

    #[test]
    fn unknown_commands_do_not_mutate_state() {
        let d = dispatcher();
        let reply = d.dispatch(0xff, CommandParams::None);
        assert_eq!(reply, CommandReply::error(ErrorCode::UnknownCommand));
        // Unknown ids must not even trigger the implicit connect.
        assert!(!d.link.is_connected());
    }

    #[test]
    fn dispatch_connects_implicitly() {
        let d = dispatcher();
        assert!(!d.link.is_connected());
        let reply = d.dispatch(0x01, CommandParams::None);
        assert!(reply.is_success());
        assert!(d.link.is_connected());
    }

    #[test]
    fn refused_connect_surfaces_not_connected() {
        let link = Link::new(
            LinkConfig::new("refused")
                .immediate()
                .with_rng_seed(17)
                .with_refusal_probability(1.0),
        );
        let d = Dispatcher::new(Arc::new(link));
        let reply = d.dispatch(0x01, CommandParams::None);
        assert_eq!(reply, CommandReply::error(ErrorCode::NotConnected));
    }

    #[test]
    fn query_available_space_reports_quota() {
        let d = dispatcher();
        let reply = d.dispatch(0x01, CommandParams::None);
        let CommandReply::AvailableSpace { available, total } = reply else {
            panic!("unexpected reply: {reply:?}");
        };
        assert!(total >= available);
    }

    #[test]
    fn sync_save_data_returns_timestamp() {
        let d = dispatcher();
        let reply = d.dispatch(0x02, CommandParams::None);
        let CommandReply::SyncComplete { last_sync } = reply else {
            panic!("unexpected reply: {reply:?}");
        };
        assert!(last_sync > 0);
    }

    #[test]
    fn custom_content_is_stored_with_documented_size() {
        let d = dispatcher();
        let reply = d.dispatch(0x03, CommandParams::CustomContent { content_id: 5 });
        let CommandReply::ContentReady {
            content_id,
            size,
            path,
        } = reply
        else {
            panic!("unexpected reply: {reply:?}");
        };
        assert_eq!(content_id, 5);
        assert_eq!(size, 16_384 + 5 * 1_024);
        assert_eq!(path, "extended_levels/content_5");

        let stored = d.link.service().get_custom_level("content_5").unwrap();
        let data = stored.get("data").and_then(Value::as_bytes).unwrap();
        assert_eq!(data.len() as u64, size);
    }

    #[test]
    fn extended_asset_is_stored_with_documented_size() {
        let d = dispatcher();
        let reply = d.dispatch(0x04, CommandParams::ExtendedAsset { asset_id: 3 });
        let CommandReply::AssetReady { asset_id, size } = reply else {
            panic!("unexpected reply: {reply:?}");
        };
        assert_eq!(asset_id, 3);
        assert_eq!(size, 4_096 + 3 * 256);
        assert!(d
            .link
            .service()
            .contains("extended_assets/asset_3")
            .unwrap());
    }

    #[test]
    fn telemetry_accepts_malformed_payloads() {
        let d = dispatcher();
        let reply = d.dispatch(
            0x05,
            CommandParams::Malformed {
                raw: vec![0xde, 0xad],
            },
        );
        assert_eq!(reply, CommandReply::TelemetryAccepted);
    }

    #[test]
    fn leaderboards_are_deterministic() {
        let d = dispatcher();
        let first = d.dispatch(0x06, CommandParams::Leaderboard { board_id: 7 });
        let second = d.dispatch(0x06, CommandParams::Leaderboard { board_id: 7 });
        assert_eq!(first, second);

        let CommandReply::Leaderboard { entries, .. } = first else {
            panic!("unexpected reply");
        };
        assert_eq!(entries.len(), 17);
        for pair in entries.windows(2) {
            assert!(pair[0].score >= pair[1].score);
            assert!(pair[0].rank < pair[1].rank);
        }
    }

    #[test]
    fn generated_payloads_are_deterministic() {
        assert_eq!(generated_bytes(9, 128), generated_bytes(9, 128));
        assert_ne!(generated_bytes(9, 128), generated_bytes(10, 128));
    }

    #[test]
    fn quota_exhaustion_maps_to_wire_code() {
        let link = Link::new(
            LinkConfig::new("small_quota")
                .immediate()
                .with_rng_seed(17)
                .with_capacity(2_048),
        );
        let d = Dispatcher::new(Arc::new(link));
        let reply = d.dispatch(0x03, CommandParams::CustomContent { content_id: 1 });
        assert_eq!(reply, CommandReply::error(ErrorCode::QuotaExceeded));
    }
}
