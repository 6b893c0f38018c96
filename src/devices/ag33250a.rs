
use std::str;
use std::thread;
use std::time::Duration;

use lazy_static::lazy_static;
use log::{debug, info};
use regex::{Captures, Match, Regex};
use serde::{Serialize, Deserialize};

use crate::block;
use crate::error::{Error, Result};
use crate::transport::{SerialClient, SerialConfig, Transport};

lazy_static! {
	static ref IDN_RE: Regex = Regex::new("([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
}

/// The 33250A only takes arbitrary waveforms of exactly this many points
/// over the remote interface upload used here
pub const SAMPLES_PER_UPLOAD: usize = 64_000;

pub const DEFAULT_BLOCK_PAUSE_SEC: f32 = 0.5;
pub const DEFAULT_TEXT_CHUNK_LEN: usize = 40;
pub const DEFAULT_TEXT_CHUNK_PAUSE_SEC: f32 = 0.1;
pub const DEFAULT_TEXT_LEAD_IN_PAUSE_SEC: f32 = 0.01;

/// Agilent 33250A arbitrary waveform generator.
///
/// One value of this type owns one open connection for its whole lifetime.
/// Nothing here is safe to drive from two threads at once; the instrument
/// itself processes one command at a time.
pub struct AG33250A<T: Transport> {
	transport: T,
	/// Pause between the `DATA:DAC VOLATILE, #...` header and the bulk
	/// payload, covering the command-processing latency the manual documents
	pub block_pause: Duration,
	pub text_pacing: TextPacing,
	pub idn: Option<Idn>,
}

/// Rate limiting for the textual upload path, which overruns the serial
/// write buffer without it.
#[derive(Debug, Clone)]
pub struct TextPacing {
	pub chunk_len: usize,
	pub chunk_pause: Duration,
	pub lead_in_pause: Duration,
}

impl Default for TextPacing {

	fn default() -> Self {
		TextPacing {
			chunk_len: DEFAULT_TEXT_CHUNK_LEN,
			chunk_pause: Duration::from_secs_f32(DEFAULT_TEXT_CHUNK_PAUSE_SEC),
			lead_in_pause: Duration::from_secs_f32(DEFAULT_TEXT_LEAD_IN_PAUSE_SEC),
		}
	}

}

#[derive(Debug, Serialize, Deserialize)]
pub struct Idn {
	pub manufacturer: String,
	pub model: String,
	pub serial_num: String,
	pub fw_version: String,
}

fn match_str(opt_match: Option<Match>, err: &str) -> Result<String> {
	match opt_match {
		Some(m) => Ok(m.as_str().to_owned()),
		None    => Err(Error::Connection(err.to_owned())),
	}
}

fn parse_idn(resp: &str) -> Result<Idn> {
	let caps: Captures = match IDN_RE.captures(resp) {
		Some(c) => c,
		None => return Err(Error::Connection(format!("Unable to match *IDN? response: {:?}", resp))),
	};

	let manufacturer: String = match_str(caps.get(1), "No match for manufacturer")?;
	let model: String        = match_str(caps.get(2), "No match for model")?;
	let serial_num: String   = match_str(caps.get(3), "No match for serial_num")?;
	let fw_version: String   = match_str(caps.get(4), "No match for fw_version")?;

	Ok(Idn { manufacturer, model, serial_num, fw_version })
}

impl AG33250A<SerialClient> {

	/// Opens the serial transport, confirms the instrument identifies as a
	/// 33250A, and keeps the parsed identification around in `self.idn`.
	pub fn open(config: &SerialConfig) -> Result<Self> {
		let client = SerialClient::open(config)?;

		let mut dev = Self::with_transport(client);
		let idn = dev.identify()
			.map_err(|e| Error::Connection(format!("identification query failed: {}", e)))?;

		if !idn.model.contains("33250A") {
			return Err(Error::Connection(format!(
				"Successfully connected to a device but it doesn't appear to be the right model: {}", idn.model)));
		}

		dev.idn = Some(idn);
		Ok(dev)
	}

}

impl<T: Transport> AG33250A<T> {

	/// Wraps an already-open transport without the identification handshake.
	pub fn with_transport(transport: T) -> Self {
		AG33250A {
			transport,
			block_pause: Duration::from_secs_f32(DEFAULT_BLOCK_PAUSE_SEC),
			text_pacing: TextPacing::default(),
			idn: None,
		}
	}

	fn identify(&mut self) -> Result<Idn> {
		let resp: String = self.ask("*IDN?")?;
		info!("instrument identification: {}", resp);
		parse_idn(&resp)
	}

	/// Uploads `samples` into the instrument's volatile memory as one
	/// IEEE-488.2 definite-length binary block.  This is the fast path; the
	/// payload is exactly 128000 bytes for the 64000 samples.
	pub fn upload_binary(&mut self, samples: &[i16]) -> Result<()> {
		self.check_len(samples)?;

		// Little-endian byte order on the instrument side to match the block encoding
		self.transport.write_str("FORM:BORD SWAP")?;

		let payload: Vec<u8> = block::pack_samples(samples)?;
		let header: String = format!("DATA:DAC VOLATILE, {}", block::definite_length_header(payload.len()));

		self.transport.write_raw(header.as_bytes())?;
		thread::sleep(self.block_pause);
		self.transport.write_raw(&payload)?;
		self.transport.write_raw(b"\n")
	}

	/// Uploads `samples` as comma-separated decimal text, halving each value
	/// to match the amplitude scaling the text-mode command expects.
	///
	/// Slow compatibility path, kept for debugging; at the default pacing a
	/// full upload takes over two minutes.  Use `upload_binary` instead.
	pub fn upload_array_textual(&mut self, samples: &[i16]) -> Result<()> {
		self.check_len(samples)?;

		self.transport.write_raw(b"DATA:DAC VOLATILE")?;
		thread::sleep(self.text_pacing.lead_in_pause);

		let mut sent: usize = 0;
		for chunk in samples.chunks(self.text_pacing.chunk_len) {
			let values: String = chunk.iter()
				.map(|v| (v / 2).to_string())
				.collect::<Vec<String>>()
				.join(", ");
			self.transport.write_raw(format!(", {}", values).as_bytes())?;

			sent += chunk.len();
			debug!("uploaded {} of {} samples", sent, samples.len());
			thread::sleep(self.text_pacing.chunk_pause);
		}

		self.transport.write_raw(b"\n")
	}

	fn check_len(&self, samples: &[i16]) -> Result<()> {
		if samples.len() != SAMPLES_PER_UPLOAD {
			Err(Error::Encoding(format!("expected exactly {} samples, got {}", SAMPLES_PER_UPLOAD, samples.len())))
		} else {
			Ok(())
		}
	}

	/// Copies the volatile waveform to the named non-volatile slot and
	/// selects it as the active user function.  Two commands, in that order,
	/// with no rollback if the second one fails.
	pub fn save_volatile(&mut self, name: &str) -> Result<()> {
		self.write(&format!("DATA:COPY {}, VOLATILE", name))?;
		self.write(&format!("FUNC:USER {}", name))
	}

	/// Configures triggered burst output and fires one software trigger.
	///
	/// A fixed command sequence, issued unconditionally; commands already
	/// sent stay in effect if a later one fails.  The burst cycle count is
	/// left at the instrument's current setting (see the command inventory
	/// at the bottom of this file for `BURS:NCYC`).
	pub fn burst(&mut self) -> Result<()> {
		self.write("OUTP OFF")?;
		self.write("BURS:MODE TRIG")?;
		self.write("BURS:INT:PER 1")?; // internal trigger interval, 1 us to 500 s
		self.write("BURS:PHAS 0")?;
		self.write("TRIG:SOUR BUS")?;
		self.write("BURS:STAT ON")?;
		self.write("OUTP ON")?;
		self.write("*TRG")
	}

	pub fn set_output(&mut self, on: bool) -> Result<()> {
		self.write(if on { "OUTP ON" } else { "OUTP OFF" })
	}

	/// Selects the user-defined waveform (as opposed to the built-in
	/// functions) as the output function.
	pub fn select_user_function(&mut self) -> Result<()> {
		self.write("FUNC USER")
	}

	/// Sends one command verbatim (terminator added by the transport).  No
	/// validation; correctness is on the caller, per the command manual.
	pub fn write(&mut self, cmd: &str) -> Result<()> {
		self.transport.write_str(cmd)
	}

	/// Blocks until one response line is available.
	pub fn read(&mut self) -> Result<String> {
		self.transport.read_line()
	}

	pub fn ask(&mut self, cmd: &str) -> Result<String> {
		self.write(cmd)?;
		self.read()
	}

	/// Closes the connection by dropping the transport.  Consuming `self`
	/// makes a double close unrepresentable.
	pub fn close(self) {}

	/// Releases the underlying transport without closing it.
	pub fn into_transport(self) -> T { self.transport }

}

// Not Yet Implemented
// APPL:SIN / APPL:SQU / ...            one-command function selection with frequency, amplitude, offset
// FREQ / VOLT / VOLT:OFFS              output configuration
// PULS:PER / PULS:WIDT / PULS:TRAN     pulse configuration
// AM / FM / FSK                        modulation subsystems
// SWE:STAR / SWE:STOP / SWE:TIME       frequency sweep
// BURS:NCYC                            burst cycle count (burst() leaves the instrument's current setting)
// TRIG:DEL / TRIG:SLOP                 trigger configuration beyond source selection
// DATA:CAT? / DATA:NVOL:CAT? / DATA:DEL  waveform catalog management
// SYST:ERR? / *CLS                     error queue readout
// *RST *OPC? *SAV *RCL                 reset, sync, and instrument state storage

// Implemented
// *IDN?                                identification, parsed on open
// FORM:BORD                            byte order for binary blocks
// DATA:DAC VOLATILE                    waveform upload, binary block and comma-separated text
// DATA:COPY / FUNC:USER                non-volatile save and selection
// BURS:MODE / BURS:INT:PER / BURS:PHAS / BURS:STAT / TRIG:SOUR   burst setup
// OUTP                                 output enable
// FUNC USER                            select the active user waveform
// *TRG                                 software trigger, end of burst()

#[cfg(test)]
mod tests {

	use std::collections::VecDeque;

	use super::*;

	#[derive(Debug, PartialEq)]
	enum Op {
		Write(String),
		WriteRaw(Vec<u8>),
	}

	#[derive(Default)]
	struct MockTransport {
		ops: Vec<Op>,
		responses: VecDeque<String>,
	}

	impl Transport for MockTransport {

		fn write_str(&mut self, cmd: &str) -> Result<()> {
			self.ops.push(Op::Write(cmd.to_owned()));
			Ok(())
		}

		fn write_raw(&mut self, data: &[u8]) -> Result<()> {
			self.ops.push(Op::WriteRaw(data.to_vec()));
			Ok(())
		}

		fn read_line(&mut self) -> Result<String> {
			self.responses.pop_front()
				.ok_or_else(|| Error::Connection("no response queued".to_owned()))
		}

	}

	fn quiet_dev() -> AG33250A<MockTransport> {
		let mut dev = AG33250A::with_transport(MockTransport::default());
		dev.block_pause = Duration::from_secs(0);
		dev.text_pacing.chunk_pause = Duration::from_secs(0);
		dev.text_pacing.lead_in_pause = Duration::from_secs(0);
		dev
	}

	#[test]
	fn binary_upload_rejects_wrong_length_before_any_traffic() {
		let mut dev = quiet_dev();

		match dev.upload_binary(&[0i16; 100]) {
			Err(Error::Encoding(_)) => {},
			other => panic!("expected encoding error, got {:?}", other),
		}

		assert!(dev.into_transport().ops.is_empty());
	}

	#[test]
	fn textual_upload_rejects_wrong_length_before_any_traffic() {
		let mut dev = quiet_dev();

		match dev.upload_array_textual(&[0i16; 63_999]) {
			Err(Error::Encoding(_)) => {},
			other => panic!("expected encoding error, got {:?}", other),
		}

		assert!(dev.into_transport().ops.is_empty());
	}

	#[test]
	fn binary_upload_sends_exact_header_and_128000_byte_payload() {
		let mut dev = quiet_dev();
		dev.upload_binary(&vec![0i16; SAMPLES_PER_UPLOAD]).unwrap();

		let ops = dev.into_transport().ops;
		assert_eq!(ops.len(), 4);
		assert_eq!(ops[0], Op::Write("FORM:BORD SWAP".to_owned()));
		assert_eq!(ops[1], Op::WriteRaw(b"DATA:DAC VOLATILE, #6128000".to_vec()));

		match &ops[2] {
			Op::WriteRaw(payload) => {
				assert_eq!(payload.len(), 128_000);
				assert!(payload.iter().all(|&b| b == 0));
			},
			other => panic!("expected raw payload, got {:?}", other),
		}

		assert_eq!(ops[3], Op::WriteRaw(b"\n".to_vec()));
	}

	#[test]
	fn binary_upload_encodes_samples_little_endian() {
		let mut dev = quiet_dev();
		dev.upload_binary(&vec![2047i16; SAMPLES_PER_UPLOAD]).unwrap();

		let ops = dev.into_transport().ops;
		match &ops[2] {
			Op::WriteRaw(payload) => {
				for pair in payload.chunks(2) {
					assert_eq!(pair, [0xFF, 0x07]);
				}
			},
			other => panic!("expected raw payload, got {:?}", other),
		}
	}

	#[test]
	fn textual_upload_chunks_and_halves() {
		let mut dev = quiet_dev();
		dev.upload_array_textual(&vec![100i16; SAMPLES_PER_UPLOAD]).unwrap();

		let ops = dev.into_transport().ops;

		// lead-in, 1600 chunks of 40 values, terminator
		assert_eq!(ops.len(), 1 + 1600 + 1);
		assert_eq!(ops[0], Op::WriteRaw(b"DATA:DAC VOLATILE".to_vec()));
		assert_eq!(ops[ops.len() - 1], Op::WriteRaw(b"\n".to_vec()));

		for op in &ops[1..ops.len() - 1] {
			match op {
				Op::WriteRaw(chunk) => {
					let text = str::from_utf8(chunk).unwrap();
					assert!(text.starts_with(", 50"));
					assert_eq!(text.matches("50").count(), 40);
				},
				other => panic!("expected raw chunk, got {:?}", other),
			}
		}
	}

	#[test]
	fn save_volatile_copies_then_selects() {
		let mut dev = quiet_dev();
		dev.save_volatile("MYARB").unwrap();

		let ops = dev.into_transport().ops;
		assert_eq!(ops, vec![
			Op::Write("DATA:COPY MYARB, VOLATILE".to_owned()),
			Op::Write("FUNC:USER MYARB".to_owned()),
		]);
	}

	#[test]
	fn burst_issues_the_eight_command_sequence() {
		let mut dev = quiet_dev();
		dev.burst().unwrap();

		let expected: Vec<Op> = [
			"OUTP OFF",
			"BURS:MODE TRIG",
			"BURS:INT:PER 1",
			"BURS:PHAS 0",
			"TRIG:SOUR BUS",
			"BURS:STAT ON",
			"OUTP ON",
			"*TRG",
		].iter().map(|c| Op::Write((*c).to_owned())).collect();

		assert_eq!(dev.into_transport().ops, expected);
	}

	#[test]
	fn identify_parses_the_idn_response() {
		let mut transport = MockTransport::default();
		transport.responses.push_back("Agilent Technologies,33250A,0,2.01-1.01-2.01-03-2".to_owned());

		let mut dev = AG33250A::with_transport(transport);
		let idn = dev.identify().unwrap();

		assert_eq!(idn.manufacturer, "Agilent Technologies");
		assert_eq!(idn.model, "33250A");
		assert_eq!(idn.serial_num, "0");
		assert_eq!(idn.fw_version, "2.01-1.01-2.01-03-2");

		assert_eq!(dev.into_transport().ops, vec![Op::Write("*IDN?".to_owned())]);
	}

	#[test]
	fn malformed_idn_response_is_a_connection_error() {
		match parse_idn("garbage") {
			Err(Error::Connection(_)) => {},
			other => panic!("expected connection error, got {:?}", other),
		}
	}

}
