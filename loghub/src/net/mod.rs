//! 네트워크 전송 계층
//!
//! - [`protocol`]: 길이 접두 프레임, 핸드셰이크, 전송 메시지
//! - [`client`]: 원격 서버로 항목을 보내는 작성기
//! - [`server`]: 클라이언트 항목을 받아 로컬 인스턴스에 재주입하는 작성기

pub mod client;
pub mod protocol;
pub mod server;

pub use client::ClientWriterConfig;
pub use protocol::{NetError, WireMessage, MAX_FRAME_LEN, PROTOCOL_VERSION};
pub use server::ServerWriterConfig;
