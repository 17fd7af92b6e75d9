pub mod game;
pub mod league;
pub mod payload;
pub mod table;

pub use game::{Game, GameKey, GameScore};
pub use league::{Class, ClassId, Week, WeekId};
pub use payload::{
    ClassPageContent, ClassPageEnvelope, ClassPageHead, GameList, IndexContent, IndexEnvelope,
    IndexMenu, PeriodMenu, RawPayload,
};
pub use table::{Table, TableScore};
