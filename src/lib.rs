
// Error type shared by the transport layer and the device drivers
pub mod error;

// Serial transport carrying newline-terminated SCPI commands to an instrument
pub mod transport;

// IEEE-488.2 definite-length arbitrary-block encoding, used for bulk waveform uploads
pub mod block;

// Module for instruments driven over the serial transport
pub mod devices;
