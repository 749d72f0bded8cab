//! Transport trait definition
//!
//! The protocol engine never touches hardware itself. A transport provides
//! the three raw byte primitives of the SPI bus; each reports success with
//! a boolean, and any failure surfaces as
//! [`Error::BusTransportFailure`](crate::error::Error::BusTransportFailure).
//!
//! Each call is one chip-select assertion. Implementations are free to log
//! the underlying cause before returning `false`.

/// Raw SPI bus primitives
///
/// ## Example
///
/// ```ignore
/// impl BusTransport for MySpi {
///     fn transmit(&mut self, data: &[u8]) -> bool {
///         self.write(data).is_ok()
///     }
///
///     fn receive(&mut self, buf: &mut [u8]) -> bool {
///         self.read(buf).is_ok()
///     }
///
///     fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> bool {
///         self.transfer(tx, rx).is_ok()
///     }
/// }
/// ```
pub trait BusTransport {
    /// Clock out `data`, discarding whatever the chip sends back
    fn transmit(&mut self, data: &[u8]) -> bool;

    /// Clock in `buf.len()` bytes while sending filler
    fn receive(&mut self, buf: &mut [u8]) -> bool;

    /// Full-duplex exchange of `tx.len()` bytes; `rx` has the same length
    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> bool;

    /// Bring up the bus before the first exchange
    fn init(&mut self) -> bool {
        true
    }

    /// Release the bus
    fn deinit(&mut self) {}
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn transmit(&mut self, data: &[u8]) -> bool {
        (**self).transmit(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> bool {
        (**self).receive(buf)
    }

    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> bool {
        (**self).transact(tx, rx)
    }

    fn init(&mut self) -> bool {
        (**self).init()
    }

    fn deinit(&mut self) {
        (**self).deinit()
    }
}

// Boxed transports allow the CLI to pick a programmer at runtime
#[cfg(feature = "alloc")]
impl BusTransport for alloc::boxed::Box<dyn BusTransport + Send> {
    fn transmit(&mut self, data: &[u8]) -> bool {
        (**self).transmit(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> bool {
        (**self).receive(buf)
    }

    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> bool {
        (**self).transact(tx, rx)
    }

    fn init(&mut self) -> bool {
        (**self).init()
    }

    fn deinit(&mut self) {
        (**self).deinit()
    }
}
