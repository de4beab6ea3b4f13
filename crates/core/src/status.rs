//! Status enums mapping to SMALLSERIAL lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` table created by `db/migrations`.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up the enum variant for a raw status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// AI campaign lifecycle status.
    CampaignStatus {
        Active = 1,
        Paused = 2,
        Exhausted = 3,
        Ended = 4,
    }
}

define_status_enum! {
    /// Outer scan execution status.
    ScanStatus {
        Pending = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// AI enrichment sub-status. Only meaningful when a scan has
    /// `ai_enabled = true`.
    AiStatus {
        Pending = 1,
        Downloaded = 2,
        Processing = 3,
        Completed = 4,
        Failed = 5,
    }
}

define_status_enum! {
    /// Batch lifecycle status.
    BatchStatus {
        Pending = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
        Cancelled = 5,
        Stale = 6,
    }
}

impl ScanStatus {
    /// Completed or failed — no further automatic transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl AiStatus {
    /// Completed or failed — only the administrative retry leaves Failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl BatchStatus {
    /// A closed batch ignores further terminal-scan notifications.
    ///
    /// Cancelled counts as closed even though no aggregation ran: once an
    /// administrator cancels a batch, late scan completions must not reopen
    /// or re-aggregate it.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_status_ids_match_seed_data() {
        assert_eq!(ScanStatus::Pending.id(), 1);
        assert_eq!(ScanStatus::Running.id(), 2);
        assert_eq!(ScanStatus::Completed.id(), 3);
        assert_eq!(ScanStatus::Failed.id(), 4);
    }

    #[test]
    fn ai_status_ids_match_seed_data() {
        assert_eq!(AiStatus::Pending.id(), 1);
        assert_eq!(AiStatus::Downloaded.id(), 2);
        assert_eq!(AiStatus::Processing.id(), 3);
        assert_eq!(AiStatus::Completed.id(), 4);
        assert_eq!(AiStatus::Failed.id(), 5);
    }

    #[test]
    fn batch_status_ids_match_seed_data() {
        assert_eq!(BatchStatus::Pending.id(), 1);
        assert_eq!(BatchStatus::Running.id(), 2);
        assert_eq!(BatchStatus::Completed.id(), 3);
        assert_eq!(BatchStatus::Failed.id(), 4);
        assert_eq!(BatchStatus::Cancelled.id(), 5);
        assert_eq!(BatchStatus::Stale.id(), 6);
    }

    #[test]
    fn campaign_status_ids_match_seed_data() {
        assert_eq!(CampaignStatus::Active.id(), 1);
        assert_eq!(CampaignStatus::Paused.id(), 2);
        assert_eq!(CampaignStatus::Exhausted.id(), 3);
        assert_eq!(CampaignStatus::Ended.id(), 4);
    }

    #[test]
    fn from_id_round_trips() {
        for id in 1..=4 {
            assert_eq!(ScanStatus::from_id(id).unwrap().id(), id);
        }
        assert_eq!(ScanStatus::from_id(0), None);
        assert_eq!(ScanStatus::from_id(99), None);
    }

    #[test]
    fn terminal_classification() {
        assert!(ScanStatus::Completed.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
        assert!(!ScanStatus::Pending.is_terminal());
        assert!(!ScanStatus::Running.is_terminal());
    }

    #[test]
    fn closed_batches_include_cancelled() {
        assert!(BatchStatus::Completed.is_closed());
        assert!(BatchStatus::Failed.is_closed());
        assert!(BatchStatus::Cancelled.is_closed());
        assert!(!BatchStatus::Running.is_closed());
        assert!(!BatchStatus::Stale.is_closed());
    }
}
