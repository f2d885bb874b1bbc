//! Streaming decoder for P1 telegrams.
//!
//! Bytes can be fed in chunks of any size, the decoder keeps all state
//! between calls and hands every complete telegram to the listener from
//! within [`TelegramDecoder::feed`]. Feeding needs `&mut self`, so one
//! decoder belongs to exactly one reader. Use one decoder per connection.

use super::reading::ReadingFactory;
use super::structs::{P1Telegram, TelegramStatus};
use crate::checksum::Crc16;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

lazy_static! {
    static ref CRC_DIGITS_PATTERN: Regex = Regex::new(r"^[0-9A-Z]{4}$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    WaitForStart,
    Header,
    Crlf,
    DataObisId,
    DataObisValue,
    DataObisValueEnd,
    CrcValue,
}

/* What happens to the byte once the decoder is in the next state */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Outside of a telegram or abandoned, nothing to account
    Ignore,
    /// Checksum only
    Fold,
    HeaderText,
    ObisId,
    ObisValue,
    /// Another `(value)` group of the same record follows
    NextValueGroup,
    /// Drop the record collected so far, then fold
    Discard,
    CrcDigit,
    /// Trailer finished, validate and hand out the telegram
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    next: State,
    action: Action,
    corrupted: bool,
}

impl Transition {
    fn to(next: State, action: Action) -> Self {
        Self { next, action, corrupted: false }
    }

    fn corrupt(next: State, action: Action) -> Self {
        Self { next, action, corrupted: true }
    }
}

fn is_obis_id_char(byte: u8) -> bool {
    byte.is_ascii_digit() || matches!(byte, b':' | b'-' | b'.' | b'*')
}

fn transition(state: State, byte: u8, lenient: bool) -> Transition {
    match state {
        State::WaitForStart => match byte {
            b'/' => Transition::to(State::Header, Action::Fold),
            _ => Transition::to(State::WaitForStart, Action::Ignore),
        },
        State::Header => match byte {
            b'\r' => Transition::to(State::Crlf, Action::Fold),
            _ => Transition::to(State::Header, Action::HeaderText),
        },
        State::Crlf => {
            if byte.is_ascii_whitespace() {
                Transition::to(State::Crlf, Action::Fold)
            } else if byte.is_ascii_digit() {
                Transition::to(State::DataObisId, Action::ObisId)
            } else {
                Transition::corrupt(State::WaitForStart, Action::Ignore)
            }
        }
        State::DataObisId => {
            if byte.is_ascii_whitespace() {
                Transition::to(State::DataObisId, Action::Fold)
            } else if is_obis_id_char(byte) {
                Transition::to(State::DataObisId, Action::ObisId)
            } else if byte == b'(' {
                Transition::to(State::DataObisValue, Action::Fold)
            } else if !lenient {
                Transition::corrupt(State::WaitForStart, Action::Ignore)
            } else if byte == b'!' {
                Transition::corrupt(State::CrcValue, Action::Discard)
            } else {
                Transition::corrupt(State::DataObisId, Action::Discard)
            }
        }
        State::DataObisValue => match byte {
            b')' => Transition::to(State::DataObisValueEnd, Action::Fold),
            _ => Transition::to(State::DataObisValue, Action::ObisValue),
        },
        State::DataObisValueEnd => {
            if byte.is_ascii_whitespace() {
                Transition::to(State::DataObisValueEnd, Action::Fold)
            } else if byte.is_ascii_digit() {
                Transition::to(State::DataObisId, Action::ObisId)
            } else if byte == b'(' {
                Transition::to(State::DataObisValue, Action::NextValueGroup)
            } else if byte == b'!' {
                Transition::to(State::CrcValue, Action::Fold)
            } else if lenient {
                Transition::corrupt(State::DataObisValueEnd, Action::Fold)
            } else {
                Transition::corrupt(State::WaitForStart, Action::Ignore)
            }
        }
        State::CrcValue => match byte {
            b'\r' | b'/' => Transition::to(State::WaitForStart, Action::Complete),
            b'!' => Transition::to(State::CrcValue, Action::Fold),
            _ => Transition::to(State::CrcValue, Action::CrcDigit),
        },
    }
}

pub struct TelegramDecoder<F, L>
where
    F: ReadingFactory,
    L: FnMut(P1Telegram<F::Reading>),
{
    factory: F,
    listener: L,
    state: State,
    crc: Crc16,
    header: String,
    obis_id: String,
    obis_value: String,
    crc_value: String,
    raw: Vec<u8>,
    readings: Vec<F::Reading>,
    unknown_readings: Vec<(String, String)>,
    corrupted: bool,
    /* Switches as requested and as latched for the running telegram */
    lenient_requested: bool,
    raw_capture_requested: bool,
    lenient: bool,
    raw_capture: bool,
}

impl<F, L> TelegramDecoder<F, L>
where
    F: ReadingFactory,
    L: FnMut(P1Telegram<F::Reading>),
{
    pub fn new(factory: F, listener: L) -> Self {
        Self {
            factory,
            listener,
            state: State::WaitForStart,
            crc: Crc16::new(),
            header: String::new(),
            obis_id: String::new(),
            obis_value: String::new(),
            crc_value: String::new(),
            raw: Vec::new(),
            readings: Vec::new(),
            unknown_readings: Vec::new(),
            corrupted: false,
            lenient_requested: false,
            raw_capture_requested: false,
            lenient: false,
            raw_capture: false,
        }
    }

    /// Takes effect with the next telegram start.
    pub fn set_lenient(&mut self, lenient: bool) {
        self.lenient_requested = lenient;
    }

    /// Takes effect with the next telegram start.
    pub fn set_raw_capture(&mut self, raw_capture: bool) {
        self.raw_capture_requested = raw_capture;
    }

    pub fn is_lenient(&self) -> bool {
        self.lenient_requested
    }

    pub fn is_raw_capture(&self) -> bool {
        self.raw_capture_requested
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Consumes a chunk of the stream.
    ///
    /// The listener is called for every telegram completed by this chunk,
    /// in order. The only error is one returned by the reading factory; the
    /// telegram it occurred in is dropped and the rest of the chunk is not
    /// consumed.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), F::Error> {
        for byte in data {
            self.process_byte(*byte)?;
        }
        Ok(())
    }

    /// Drops everything collected for the current telegram and waits for
    /// the next `/`, e.g. after the transport reconnected.
    pub fn reset(&mut self) {
        self.clear();
        self.state = State::WaitForStart;
    }

    fn process_byte(&mut self, byte: u8) -> Result<(), F::Error> {
        let transition = transition(self.state, byte, self.lenient);

        if transition.corrupted {
            debug!(
                "Unexpected character 0x{:02X} in state {:?}, telegram corrupted",
                byte, self.state
            );
            self.corrupted = true;
        }

        if transition.action == Action::Discard {
            self.obis_id.clear();
            self.obis_value.clear();
        }

        /* The line end closing the checksum still belongs to the telegram */
        if self.raw_capture && transition.action == Action::Complete && byte == b'\r' {
            self.raw.push(byte);
        }

        if transition.next != self.state {
            if let Err(e) = self.enter(transition.next) {
                self.reset();
                return Err(e);
            }
        }

        if self.raw_capture && self.state != State::WaitForStart {
            self.raw.push(byte);
        }

        match transition.action {
            Action::Ignore | Action::Complete => {}
            Action::Fold | Action::Discard => self.crc.update(byte),
            Action::HeaderText => {
                self.header.push(byte as char);
                self.crc.update(byte);
            }
            Action::ObisId => {
                self.obis_id.push(byte as char);
                self.crc.update(byte);
            }
            Action::ObisValue => {
                self.obis_value.push(byte as char);
                self.crc.update(byte);
            }
            Action::NextValueGroup => {
                self.obis_value.push_str(")(");
                self.crc.update(byte);
            }
            Action::CrcDigit => self.crc_value.push(byte as char),
        }

        /* A '/' right after the checksum already starts the next telegram */
        if transition.action == Action::Complete && byte == b'/' {
            return self.process_byte(byte);
        }

        Ok(())
    }

    fn enter(&mut self, next: State) -> Result<(), F::Error> {
        match next {
            State::Header => {
                self.crc.reset(0);
                self.lenient = self.lenient_requested;
                self.raw_capture = self.raw_capture_requested;
            }
            State::DataObisId => {
                if self.state != State::Crlf {
                    self.commit_reading()?;
                }
            }
            State::CrcValue => self.commit_reading()?,
            State::WaitForStart => {
                if self.state == State::CrcValue {
                    self.complete_telegram();
                }
                self.clear();
            }
            State::Crlf | State::DataObisValue | State::DataObisValueEnd => {}
        }

        self.state = next;
        Ok(())
    }

    fn commit_reading(&mut self) -> Result<(), F::Error> {
        if self.obis_id.is_empty() {
            self.obis_value.clear();
            return Ok(());
        }

        let result = self.factory.decode_reading(&self.obis_id, &self.obis_value);
        match result {
            Ok(Some(reading)) => self.readings.push(reading),
            Ok(None) => {
                debug!("No reading for {}({})", self.obis_id, self.obis_value);
                self.unknown_readings.push((self.obis_id.clone(), self.obis_value.clone()));
            }
            Err(e) => return Err(e),
        }

        self.obis_id.clear();
        self.obis_value.clear();
        Ok(())
    }

    fn verify_checksum(&self) -> TelegramStatus {
        if !CRC_DIGITS_PATTERN.is_match(&self.crc_value) {
            debug!("Malformed checksum '{}'", self.crc_value);
            return TelegramStatus::ChecksumMismatch;
        }

        match u16::from_str_radix(&self.crc_value, 16) {
            Ok(expected) if expected == self.crc.current() => TelegramStatus::Ok,
            _ => {
                debug!(
                    "Checksum mismatch, received {} calculated {:04X}",
                    self.crc_value,
                    self.crc.current()
                );
                TelegramStatus::ChecksumMismatch
            }
        }
    }

    fn complete_telegram(&mut self) {
        let status = if self.corrupted {
            TelegramStatus::Corrupted
        } else if self.crc_value.is_empty() {
            TelegramStatus::Ok
        } else {
            self.verify_checksum()
        };

        let telegram = P1Telegram::new(
            self.header.clone(),
            std::mem::take(&mut self.readings),
            std::mem::take(&mut self.unknown_readings),
            status,
            std::mem::take(&mut self.raw),
        );

        (self.listener)(telegram);
    }

    fn clear(&mut self) {
        self.header.clear();
        self.obis_id.clear();
        self.obis_value.clear();
        self.crc_value.clear();
        self.raw.clear();
        self.readings.clear();
        self.unknown_readings.clear();
        self.corrupted = false;
    }
}
