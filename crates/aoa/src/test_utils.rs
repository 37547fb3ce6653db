//! Test utilities
//!
//! Scripted mock implementations of the USB access traits, used by the unit
//! and integration tests to drive the negotiation state machine and the
//! framed channel without hardware.
//!
//! Lookups are consumed one per [`crate::usb::UsbBackend::open_device`] call
//! (the locator makes two per pass: unconfigured id first, then configured
//! id); an exhausted lookup queue reports the device as absent. Control and
//! bulk writes default to acknowledging the full payload when unscripted,
//! unscripted bulk reads time out, and unscripted control reads fail, so
//! happy-path tests only script the interesting transfers.
//!
//! # Example
//!
//! ```
//! use aoa::test_utils::{MockBackend, MockDevice};
//!
//! let mut backend = MockBackend::new();
//! backend.push_lookup(Some(MockDevice::default())); // unconfigured id
//! backend.push_lookup(None);                        // configured id
//! ```

use crate::config::PeripheralIdentity;
use crate::usb::{UsbBackend, UsbDevice, UsbError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Identity used throughout the tests (the original tool's Nexus defaults)
pub fn test_identity() -> PeripheralIdentity {
    PeripheralIdentity {
        vendor_id: 0x18d1,
        unconfigured_product_id: 0x4ee2,
        configured_product_id: 0x2d01,
    }
}

/// One logged control transfer (reads log an empty `data`)
#[derive(Debug, Clone)]
pub struct ControlEntry {
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub data: Vec<u8>,
}

/// One logged bulk OUT transfer
#[derive(Debug, Clone)]
pub struct BulkWrite {
    pub endpoint: u8,
    pub data: Vec<u8>,
}

#[derive(Debug)]
enum WriteScript {
    Ack(usize),
    AckFull,
    Fail(UsbError),
}

/// Scripted mock device
///
/// Transfer outcomes are consumed front-to-back from per-kind queues; the
/// shared logs survive the device being moved into the bridge, so tests keep
/// a clone of the `Arc` handles before handing the device over.
#[derive(Debug)]
pub struct MockDevice {
    control_reads: VecDeque<Result<Vec<u8>, UsbError>>,
    control_writes: VecDeque<WriteScript>,
    bulk_reads: VecDeque<Result<Vec<u8>, UsbError>>,
    bulk_writes: VecDeque<WriteScript>,
    endpoints: Vec<u8>,
    control_log: Arc<Mutex<Vec<ControlEntry>>>,
    bulk_out_log: Arc<Mutex<Vec<BulkWrite>>>,
    resets: Arc<Mutex<u32>>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::with_endpoints(vec![0x02, 0x81])
    }
}

impl MockDevice {
    /// Device whose active interface exposes the given endpoint addresses
    pub fn with_endpoints(endpoints: Vec<u8>) -> Self {
        Self {
            control_reads: VecDeque::new(),
            control_writes: VecDeque::new(),
            bulk_reads: VecDeque::new(),
            bulk_writes: VecDeque::new(),
            endpoints,
            control_log: Arc::new(Mutex::new(Vec::new())),
            bulk_out_log: Arc::new(Mutex::new(Vec::new())),
            resets: Arc::new(Mutex::new(0)),
        }
    }

    /// Unconfigured device that reports the given AOA protocol version
    pub fn reporting_version(version: u16) -> Self {
        let mut device = Self::default();
        device.push_control_read(Ok(version.to_le_bytes().to_vec()));
        device
    }

    pub fn push_control_read(&mut self, result: Result<Vec<u8>, UsbError>) {
        self.control_reads.push_back(result);
    }

    pub fn push_control_write(&mut self, result: Result<usize, UsbError>) {
        self.control_writes.push_back(match result {
            Ok(n) => WriteScript::Ack(n),
            Err(e) => WriteScript::Fail(e),
        });
    }

    /// Script one control write that acknowledges its full payload
    pub fn push_control_write_ack_full(&mut self) {
        self.control_writes.push_back(WriteScript::AckFull);
    }

    pub fn push_bulk_read(&mut self, result: Result<Vec<u8>, UsbError>) {
        self.bulk_reads.push_back(result);
    }

    pub fn push_bulk_write(&mut self, result: Result<usize, UsbError>) {
        self.bulk_writes.push_back(match result {
            Ok(n) => WriteScript::Ack(n),
            Err(e) => WriteScript::Fail(e),
        });
    }

    /// Handle to the control transfer log
    pub fn control_log(&self) -> Arc<Mutex<Vec<ControlEntry>>> {
        Arc::clone(&self.control_log)
    }

    /// Handle to the bulk OUT transfer log
    pub fn bulk_out_log(&self) -> Arc<Mutex<Vec<BulkWrite>>> {
        Arc::clone(&self.bulk_out_log)
    }

    /// Handle to the reset counter
    pub fn reset_counter(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.resets)
    }

    fn pop_write(queue: &mut VecDeque<WriteScript>, data_len: usize) -> Result<usize, UsbError> {
        match queue.pop_front() {
            None | Some(WriteScript::AckFull) => Ok(data_len),
            Some(WriteScript::Ack(n)) => Ok(n),
            Some(WriteScript::Fail(e)) => Err(e),
        }
    }

    fn pop_read(
        queue: &mut VecDeque<Result<Vec<u8>, UsbError>>,
        buf: &mut [u8],
        on_empty: Result<Vec<u8>, UsbError>,
    ) -> Result<usize, UsbError> {
        let data = queue.pop_front().unwrap_or(on_empty)?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }
}

impl UsbDevice for MockDevice {
    fn read_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        _timeout: Option<Duration>,
    ) -> Result<usize, UsbError> {
        self.control_log.lock().unwrap().push(ControlEntry {
            request,
            value,
            index,
            data: Vec::new(),
        });
        Self::pop_read(
            &mut self.control_reads,
            buf,
            Err(UsbError::Other("unscripted control read".to_string())),
        )
    }

    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        _timeout: Option<Duration>,
    ) -> Result<usize, UsbError> {
        self.control_log.lock().unwrap().push(ControlEntry {
            request,
            value,
            index,
            data: data.to_vec(),
        });
        Self::pop_write(&mut self.control_writes, data.len())
    }

    fn read_bulk(
        &mut self,
        _endpoint: u8,
        buf: &mut [u8],
        _timeout: Option<Duration>,
    ) -> Result<usize, UsbError> {
        Self::pop_read(&mut self.bulk_reads, buf, Err(UsbError::Timeout))
    }

    fn write_bulk(
        &mut self,
        endpoint: u8,
        data: &[u8],
        _timeout: Option<Duration>,
    ) -> Result<usize, UsbError> {
        self.bulk_out_log.lock().unwrap().push(BulkWrite {
            endpoint,
            data: data.to_vec(),
        });
        Self::pop_write(&mut self.bulk_writes, data.len())
    }

    fn endpoint_addresses(&mut self) -> Result<Vec<u8>, UsbError> {
        Ok(self.endpoints.clone())
    }

    fn reset(&mut self) -> Result<(), UsbError> {
        *self.resets.lock().unwrap() += 1;
        Ok(())
    }
}

/// Scripted mock backend
pub struct MockBackend {
    lookups: VecDeque<Result<Option<MockDevice>, UsbError>>,
    lookup_count: usize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            lookups: VecDeque::new(),
            lookup_count: 0,
        }
    }

    /// Script the outcome of the next `open_device` call
    pub fn push_lookup(&mut self, device: Option<MockDevice>) {
        self.lookups.push_back(Ok(device));
    }

    /// Script the next `open_device` call to fail
    pub fn push_lookup_err(&mut self, err: UsbError) {
        self.lookups.push_back(Err(err));
    }

    /// Total `open_device` calls made so far
    pub fn lookup_count(&self) -> usize {
        self.lookup_count
    }
}

impl UsbBackend for MockBackend {
    type Device = MockDevice;

    fn open_device(
        &mut self,
        _vendor_id: u16,
        _product_id: u16,
    ) -> Result<Option<MockDevice>, UsbError> {
        self.lookup_count += 1;
        self.lookups.pop_front().unwrap_or(Ok(None))
    }
}
