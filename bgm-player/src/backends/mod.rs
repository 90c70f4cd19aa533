//! Concrete engines backed by external programs

pub mod process_player;
pub mod ytdlp;

pub use process_player::ProcessPlayer;
pub use ytdlp::YtDlp;
