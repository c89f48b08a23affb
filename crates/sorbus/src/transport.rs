use std::env;
use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::UnixStream;
use std::process::{Child, Command, Stdio};

use crate::error::{name, Error, Result};

const ENV_STARTER_ADDRESS: &str = "DBUS_STARTER_ADDRESS";
const ENV_SESSION_BUS: &str = "DBUS_SESSION_BUS_ADDRESS";
const ENV_SYSTEM_BUS: &str = "DBUS_SYSTEM_BUS_ADDRESS";
const DEFAULT_SYSTEM_BUS: &str = "unix:path=/var/run/dbus/system_bus_socket";

/// The stream a connection talks over.
///
/// This is always backed by a single full-duplex unix stream so the event
/// loop has exactly one file descriptor to poll. Remote system connections
/// keep the bridging child process alive alongside it.
pub(crate) struct Transport {
    stream: UnixStream,
    bridge: Option<Child>,
}

impl Transport {
    /// Connect to the session bus.
    ///
    /// This uses the `DBUS_SESSION_BUS_ADDRESS` environment variable to
    /// determine its address.
    pub(crate) fn session_bus() -> Result<Self> {
        Self::from_env([ENV_STARTER_ADDRESS, ENV_SESSION_BUS], None)
    }

    /// Connect to the system bus.
    ///
    /// This uses the `DBUS_SYSTEM_BUS_ADDRESS` environment variable to
    /// determine its address, falling back to the well-known address
    /// `unix:path=/var/run/dbus/system_bus_socket`.
    pub(crate) fn system_bus() -> Result<Self> {
        Self::from_env(
            [ENV_STARTER_ADDRESS, ENV_SYSTEM_BUS],
            Some(DEFAULT_SYSTEM_BUS),
        )
    }

    /// Test if a session bus address is configured in the environment,
    /// which is how a user context is detected.
    pub(crate) fn session_bus_available() -> bool {
        env::var_os(ENV_SESSION_BUS).is_some()
    }

    /// Connect to an explicit bus address.
    pub(crate) fn with_address(address: &str) -> Result<Self> {
        let stream = match parse_address(OsStr::new(address))? {
            Address::Unix(path) => UnixStream::connect(OsStr::from_bytes(path))?,
        };

        Ok(Self::from_stream(stream))
    }

    /// Connect to the system bus of a remote host by spawning `ssh` running
    /// `systemd-stdio-bridge`, with the bridge's stdio carried over a local
    /// socket pair.
    pub(crate) fn remote_system_bus(host: &str) -> Result<Self> {
        let (local, remote) = UnixStream::pair()?;

        let child = Command::new("ssh")
            .arg("-xT")
            .arg(host)
            .arg("systemd-stdio-bridge")
            .stdin(Stdio::from(OwnedFd::from(remote.try_clone()?)))
            .stdout(Stdio::from(OwnedFd::from(remote)))
            .spawn()
            .map_err(|error| {
                Error::new(
                    name::FAILED,
                    format!("failed to spawn ssh bridge to {host}: {error}"),
                )
            })?;

        Ok(Self {
            stream: local,
            bridge: Some(child),
        })
    }

    fn from_env(
        envs: impl IntoIterator<Item: AsRef<OsStr>>,
        default: Option<&str>,
    ) -> Result<Self> {
        let address_storage;

        let address = 'address: {
            for env in envs {
                let Some(address) = env::var_os(env) else {
                    continue;
                };

                address_storage = address;
                break 'address address_storage.as_os_str();
            }

            if let Some(address) = default {
                break 'address OsStr::new(address);
            }

            return Err(Error::new(name::FAILED, "no bus address to connect to"));
        };

        let stream = match parse_address(address)? {
            Address::Unix(path) => UnixStream::connect(OsStr::from_bytes(path))?,
        };

        Ok(Self::from_stream(stream))
    }

    /// Construct a transport directly from a unix stream.
    pub(crate) fn from_stream(stream: UnixStream) -> Self {
        Self {
            stream,
            bridge: None,
        }
    }

    /// Switch the stream between blocking and non-blocking mode.
    pub(crate) fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.stream.set_nonblocking(nonblocking)
    }

    pub(crate) fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }
}

impl Read for Transport {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Transport {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl AsRawFd for Transport {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(mut child) = self.bridge.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

enum Address<'a> {
    Unix(&'a [u8]),
}

fn parse_address(string: &OsStr) -> Result<Address<'_>> {
    parse_address_bytes(string.as_bytes())
}

/// Parse the first supported entry of a `;`-separated bus address list.
fn parse_address_bytes(bytes: &[u8]) -> Result<Address<'_>> {
    for entry in bytes.split(|&b| b == b';') {
        let Some(index) = entry.iter().position(|&b| b == b'=') else {
            continue;
        };

        let (head, tail) = entry.split_at(index);

        if head == b"unix:path" {
            return Ok(Address::Unix(&tail[1..]));
        }
    }

    Err(Error::new(name::FAILED, "invalid d-bus address"))
}

#[cfg(test)]
mod tests {
    use super::{parse_address_bytes, Address};

    #[test]
    fn address_parsing() {
        let Ok(Address::Unix(path)) = parse_address_bytes(b"unix:path=/run/user/1000/bus") else {
            panic!("expected unix address");
        };

        assert_eq!(path, b"/run/user/1000/bus");

        let Ok(Address::Unix(path)) =
            parse_address_bytes(b"tcp:host=x,port=1;unix:path=/run/bus")
        else {
            panic!("expected unix address from list");
        };

        assert_eq!(path, b"/run/bus");

        assert!(parse_address_bytes(b"bogus").is_err());
    }
}
