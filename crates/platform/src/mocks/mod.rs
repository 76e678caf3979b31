//! Mock implementations for testing
//!
//! This module provides mock implementations of the platform traits for use
//! in unit and integration tests.

#![cfg(any(test, feature = "std"))]

use std::vec::Vec;

use epd_specs::PanelDescriptor;

use crate::*;

// ---------------------------------------------------------------------------
// 3-wire OTP bus
// ---------------------------------------------------------------------------

/// Errors raised by [`MockOtp`] when the caller breaks the bus protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBusError {
    /// Byte transfer while the bus was still in 4-wire mode.
    WrongMode,
    /// Byte transfer without chip-select asserted.
    NotSelected,
    /// `enter` while already in 3-wire mode, or `exit` while not.
    Unbalanced,
}

/// Simulated OTP memory behind a 3-wire bus.
///
/// After any command byte the read cursor restarts at the beginning of the
/// image; reads past its end return `0xFF` like erased memory.
pub struct MockOtp {
    image: Vec<u8>,
    cursor: usize,
    three_wire: bool,
    selected: bool,
    commands: Vec<u8>,
    enter_count: usize,
    exit_count: usize,
    fail_reads_after: Option<usize>,
}

impl MockOtp {
    /// Create a bus whose memory holds `image`, starting with the dummy byte.
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            cursor: 0,
            three_wire: false,
            selected: false,
            commands: Vec::new(),
            enter_count: 0,
            exit_count: 0,
            fail_reads_after: None,
        }
    }

    /// Fail every read once `count` bytes have been read.
    pub fn fail_reads_after(mut self, count: usize) -> Self {
        self.fail_reads_after = Some(count);
        self
    }

    /// Command bytes written so far.
    pub fn commands(&self) -> &[u8] {
        &self.commands
    }

    /// Bytes read since the last command.
    pub fn bytes_read(&self) -> usize {
        self.cursor
    }

    /// `true` while in 3-wire mode.
    pub fn is_three_wire(&self) -> bool {
        self.three_wire
    }

    /// `true` while chip-select is asserted.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Number of `enter` / `exit` calls.
    pub fn mode_switches(&self) -> (usize, usize) {
        (self.enter_count, self.exit_count)
    }

    fn check_transfer(&self) -> Result<(), MockBusError> {
        if !self.three_wire {
            return Err(MockBusError::WrongMode);
        }
        if !self.selected {
            return Err(MockBusError::NotSelected);
        }
        Ok(())
    }
}

impl ThreeWireSpi for MockOtp {
    type Error = MockBusError;

    fn enter(&mut self) -> Result<(), Self::Error> {
        if self.three_wire {
            return Err(MockBusError::Unbalanced);
        }
        self.three_wire = true;
        self.enter_count = self.enter_count.saturating_add(1);
        Ok(())
    }

    fn exit(&mut self) -> Result<(), Self::Error> {
        if !self.three_wire {
            return Err(MockBusError::Unbalanced);
        }
        self.three_wire = false;
        self.exit_count = self.exit_count.saturating_add(1);
        Ok(())
    }

    fn select(&mut self, selected: bool) -> Result<(), Self::Error> {
        self.selected = selected;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.check_transfer()?;
        self.commands.push(byte);
        self.cursor = 0;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        self.check_transfer()?;
        if self.fail_reads_after.is_some_and(|limit| self.cursor >= limit) {
            return Err(MockBusError::WrongMode);
        }
        let byte = self.image.get(self.cursor).copied().unwrap_or(0xFF);
        self.cursor = self.cursor.saturating_add(1);
        Ok(byte)
    }
}

// ---------------------------------------------------------------------------
// COG protocol
// ---------------------------------------------------------------------------

/// One recorded [`CogProtocol`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CogCall {
    /// `calibrate()`
    Calibrate,
    /// `reset()`
    Reset,
    /// `initial(mode, temperature)`
    Initial(UpdateMode, i8),
    /// `send_image(mode, ..)`
    SendImage(UpdateMode),
    /// `update(mode)`
    Update(UpdateMode),
    /// `power_off()`
    PowerOff,
    /// `wait_ms(ms)`
    Wait(u32),
}

/// Recording COG protocol.
///
/// Commits `next` into `previous` exactly like the real sequencer and keeps
/// a copy of every frame it was sent.
pub struct MockCog {
    panel: &'static PanelDescriptor,
    calls: Vec<CogCall>,
    frames: Vec<Vec<u8>>,
    calibrated: bool,
    calibration_error: Option<DisplayError>,
    update_error: Option<DisplayError>,
}

impl MockCog {
    /// Create a mock for `panel` with no recorded calls.
    pub fn new(panel: &'static PanelDescriptor) -> Self {
        Self {
            panel,
            calls: Vec::new(),
            frames: Vec::new(),
            calibrated: false,
            calibration_error: None,
            update_error: None,
        }
    }

    /// Make `calibrate` fail with `err`.
    pub fn with_calibration_error(mut self, err: DisplayError) -> Self {
        self.calibration_error = Some(err);
        self
    }

    /// Make `update` fail with `err`.
    pub fn with_update_error(mut self, err: DisplayError) -> Self {
        self.update_error = Some(err);
        self
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> &[CogCall] {
        &self.calls
    }

    /// Frames passed to `send_image`, oldest first.
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Forget recorded calls and frames.
    pub fn clear(&mut self) {
        self.calls.clear();
        self.frames.clear();
    }
}

impl CogProtocol for MockCog {
    fn panel(&self) -> &'static PanelDescriptor {
        self.panel
    }

    fn calibrate(&mut self) -> Result<(), DisplayError> {
        self.calls.push(CogCall::Calibrate);
        if let Some(err) = self.calibration_error {
            return Err(err);
        }
        self.calibrated = true;
        Ok(())
    }

    fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    fn reset(&mut self) -> Result<(), DisplayError> {
        self.calls.push(CogCall::Reset);
        Ok(())
    }

    fn initial(&mut self, mode: UpdateMode, temperature_c: i8) -> Result<(), DisplayError> {
        self.calls.push(CogCall::Initial(mode, temperature_c));
        if !self.calibrated {
            return Err(DisplayError::InvalidState);
        }
        Ok(())
    }

    fn send_image(
        &mut self,
        mode: UpdateMode,
        next: &[u8],
        previous: &mut [u8],
    ) -> Result<(), DisplayError> {
        self.calls.push(CogCall::SendImage(mode));
        if next.len() != previous.len() {
            return Err(DisplayError::InvalidBuffer);
        }
        self.frames.push(next.to_vec());
        previous.copy_from_slice(next);
        Ok(())
    }

    fn update(&mut self, mode: UpdateMode) -> Result<(), DisplayError> {
        self.calls.push(CogCall::Update(mode));
        match self.update_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn power_off(&mut self) -> Result<(), DisplayError> {
        self.calls.push(CogCall::PowerOff);
        Ok(())
    }

    fn wait_ms(&mut self, ms: u32) {
        self.calls.push(CogCall::Wait(ms));
    }
}

// ---------------------------------------------------------------------------
// Touch
// ---------------------------------------------------------------------------

/// Mock touch input
pub struct MockTouch {
    events: heapless::Deque<TouchEvent, 16>,
}

impl MockTouch {
    /// Create new mock touch input
    pub fn new() -> Self {
        Self {
            events: heapless::Deque::new(),
        }
    }

    /// Add event to queue
    pub fn add_event(&mut self, event: TouchEvent) -> Result<(), TouchEvent> {
        self.events.push_back(event)
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for MockTouch {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchInput for MockTouch {
    fn poll(&mut self) -> Result<TouchEvent, DisplayError> {
        Ok(self.events.pop_front().unwrap_or(TouchEvent::NONE))
    }

    fn interrupt(&mut self) -> Result<bool, DisplayError> {
        Ok(!self.events.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_otp_streams_from_start_after_command() {
        let mut bus = MockOtp::new(vec![0x00, 0xA5, 0x11]);
        bus.enter().unwrap();
        bus.select(true).unwrap();
        bus.write_byte(0xA2).unwrap();
        assert_eq!(bus.read_byte().unwrap(), 0x00);
        assert_eq!(bus.read_byte().unwrap(), 0xA5);
        assert_eq!(bus.read_byte().unwrap(), 0x11);
        assert_eq!(bus.read_byte().unwrap(), 0xFF);
        assert_eq!(bus.commands(), &[0xA2]);
        bus.exit().unwrap();
        assert_eq!(bus.mode_switches(), (1, 1));
    }

    #[test]
    fn test_mock_otp_rejects_four_wire_transfer() {
        let mut bus = MockOtp::new(vec![]);
        bus.select(true).unwrap();
        assert_eq!(bus.read_byte(), Err(MockBusError::WrongMode));
        assert_eq!(bus.exit(), Err(MockBusError::Unbalanced));
    }

    #[test]
    fn test_mock_cog_commits_previous() {
        let panel = epd_specs::lookup(epd_specs::panels::EPD_271_PS_TOUCH).unwrap();
        let mut cog = MockCog::new(panel);
        let next = [1u8, 2, 3];
        let mut previous = [0u8; 3];
        cog.send_image(UpdateMode::Fast, &next, &mut previous).unwrap();
        assert_eq!(previous, next);
        assert_eq!(cog.frames()[0], next.to_vec());
    }

    #[test]
    fn test_mock_touch_queue() {
        let mut touch = MockTouch::new();
        assert!(!touch.interrupt().unwrap());
        touch
            .add_event(TouchEvent::contact(TouchKind::Press, 10, 20))
            .unwrap();
        assert!(touch.interrupt().unwrap());
        assert_eq!(touch.poll().unwrap().kind, TouchKind::Press);
        assert_eq!(touch.poll().unwrap(), TouchEvent::NONE);
    }
}
