pub mod canary;
pub mod httpproxy;
