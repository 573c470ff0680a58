pub mod cancel;
pub mod interface;
pub mod loopback;
pub mod ocr;
