//! Client-side windowing engine over the karaoke server's playlists

pub mod cursor;
pub mod dispatch;
pub mod entry;
pub mod fetch;
pub mod mode;
pub mod mutation;
pub mod notice;
pub mod pane;
pub mod playlist;
pub mod session;
pub mod sides;
pub mod window;

pub use notice::{Notice, NoticeLevel, Notifier};
pub use playlist::{PlaylistId, PlaylistKind, PlaylistRef};
pub use session::{EngineEvent, QueueSession, ScrollCommand};
pub use sides::Side;
