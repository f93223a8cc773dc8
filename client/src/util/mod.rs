pub mod filter;
pub mod strutil;
pub mod tls_util;
