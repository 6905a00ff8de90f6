pub mod domain;
pub mod engine;
pub mod memory;
pub mod ports;
pub mod timeline;

pub use domain::{
    BrushMode, BrushStyle, Drawing, DrawingSummary, GuessOutcome, OpenDuel, PublicDrawing,
    StrokeEvent, Timeline, User, UserCredentials,
};
pub use engine::{normalize_word, project, DuelService, GameError, GameResult};
pub use memory::MemoryStore;
pub use ports::{Brush, DrawingStore, Renderer, StoreError, StoreResult, WordProvider};
pub use timeline::{replay, TimelineError};
