mod buf;
pub mod buf_ext;
mod buf_mut;
mod buf_stream;
mod maybe_tls;

pub use buf::Buf;
pub use buf_ext::BufExt;
pub use buf_mut::BufMut;
pub use buf_stream::BufStream;
pub use maybe_tls::MaybeTlsStream;
