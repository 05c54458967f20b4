use log::{debug, info, trace};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext};
use std::{collections::VecDeque, time::Duration};

use crate::{
    error::Error,
    link::{query_printer, send_framed, Link, TxBuffer},
};

const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    config: u8,
    iface: u8,
    setting: u8,
    address: u8,
}

/// The peripheral link reached through a USB serial bridge.
///
/// The bridge passes bytes through unchanged in both directions over a pair
/// of bulk endpoints, so the printer sees the same byte stream the laptop
/// would send it.
pub struct UsbLink {
    handle: Box<DeviceHandle<Context>>,
    endpoint_out: Endpoint,
    endpoint_in: Endpoint,
    tx: TxBuffer,
    rx: u8,
    pending: VecDeque<u8>,
}

impl UsbLink {
    /// Open the bridge with the given ids, the first one found unless
    /// `serial` narrows it down.
    pub fn open(vid: u16, pid: u16, serial: Option<&str>) -> Result<Self, Error> {
        let mut context = Context::new()?;
        let (mut device, device_desc, mut handle) =
            Self::open_device(&mut context, vid, pid, serial)?;

        let endpoint_in = Self::find_endpoint(&mut device, &device_desc, Direction::In)
            .ok_or(Error::MissingEndpoint)?;
        let endpoint_out = Self::find_endpoint(&mut device, &device_desc, Direction::Out)
            .ok_or(Error::MissingEndpoint)?;
        debug!("endpoints in {:?} out {:?}", endpoint_in, endpoint_out);

        // Serial bridges are usually claimed by a kernel tty driver
        handle.set_auto_detach_kernel_driver(true)?;
        let has_kernel_driver = matches!(handle.kernel_driver_active(endpoint_in.iface), Ok(true));
        info!(" Kernel driver support is {}", has_kernel_driver);
        handle.set_active_configuration(endpoint_in.config)?;
        handle.claim_interface(endpoint_in.iface)?;
        handle.set_alternate_setting(endpoint_in.iface, endpoint_in.setting)?;
        if endpoint_out.iface != endpoint_in.iface {
            handle.claim_interface(endpoint_out.iface)?;
            handle.set_alternate_setting(endpoint_out.iface, endpoint_out.setting)?;
        }

        Ok(UsbLink {
            handle: Box::new(handle),
            endpoint_out,
            endpoint_in,
            tx: TxBuffer::new(),
            rx: 0,
            pending: VecDeque::new(),
        })
    }

    fn open_device(
        context: &mut Context,
        vid: u16,
        pid: u16,
        serial: Option<&str>,
    ) -> Result<(Device<Context>, DeviceDescriptor, DeviceHandle<Context>), Error> {
        let devices = context.devices()?;

        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("{:?}", err);
                    continue;
                }
            };

            if device_desc.vendor_id() != vid || device_desc.product_id() != pid {
                continue;
            }
            let handle = match device.open() {
                Ok(handle) => handle,
                Err(err) => {
                    debug!("Failed to open device: {:?}", err);
                    continue;
                }
            };

            let wanted = match serial {
                Some(wanted) => wanted,
                None => return Ok((device, device_desc, handle)),
            };
            let timeout = Duration::from_secs(1);
            let languages = handle.read_languages(timeout)?;
            let language = match languages.first() {
                Some(language) => *language,
                None => continue,
            };
            match handle.read_serial_number_string(language, &device_desc, timeout) {
                Ok(s) if s == wanted => return Ok((device, device_desc, handle)),
                Ok(_) => continue,
                Err(err) => {
                    debug!("Failed to read serial number string: {:?}", err);
                    continue;
                }
            }
        }
        debug!("No device {:04x}:{:04x} matching serial {:?}", vid, pid, serial);
        Err(Error::DeviceOffline)
    }

    fn find_endpoint(
        device: &mut Device<Context>,
        device_desc: &DeviceDescriptor,
        direction: Direction,
    ) -> Option<Endpoint> {
        for n in 0..device_desc.num_configurations() {
            let config_desc = match device.config_descriptor(n) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for interface in config_desc.interfaces() {
                for interface_desc in interface.descriptors() {
                    for endpoint_desc in interface_desc.endpoint_descriptors() {
                        if endpoint_desc.direction() == direction
                            && endpoint_desc.transfer_type() == TransferType::Bulk
                        {
                            return Some(Endpoint {
                                config: config_desc.number(),
                                iface: interface_desc.interface_number(),
                                setting: interface_desc.setting_number(),
                                address: endpoint_desc.address(),
                            });
                        }
                    }
                }
            }
        }
        None
    }
}

impl Link for UsbLink {
    fn send_byte(&mut self, byte: u8) {
        match self
            .handle
            .write_bulk(self.endpoint_out.address, &[byte], WRITE_TIMEOUT)
        {
            Ok(1) => {}
            Ok(n) => debug!("write error: bytes wrote {} != 1, possibly timeout ?", n),
            Err(err) => debug!("write error: {:?}", err),
        }
    }

    fn read_byte_with_timeout(&mut self, timeout: Duration) -> bool {
        if let Some(byte) = self.pending.pop_front() {
            self.rx = byte;
            return true;
        }

        let mut buf = [0u8; READ_CHUNK];
        match self
            .handle
            .read_bulk(self.endpoint_in.address, &mut buf, timeout)
        {
            Ok(0) => false,
            Ok(n) => {
                self.rx = buf[0];
                self.pending.extend(&buf[1..n]);
                true
            }
            Err(rusb::Error::Timeout) => false,
            Err(err) => {
                trace!("read error: {:?}", err);
                false
            }
        }
    }

    fn rx_byte(&self) -> u8 {
        self.rx
    }

    fn tx_buf(&mut self) -> &mut TxBuffer {
        &mut self.tx
    }

    fn send_cmd_and_buffer(&mut self, cmd: u8) -> bool {
        send_framed(self, cmd)
    }

    fn printer_query(&mut self) -> u8 {
        query_printer(self)
    }

    fn discard_rx(&mut self) {
        if !self.pending.is_empty() {
            trace!("dropping {} stale bytes", self.pending.len());
            self.pending.clear();
        }
    }
}
