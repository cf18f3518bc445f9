//! Device type detection from the machine architecture.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Where the client reads its device type from
pub const DEVICE_TYPE_PATH: &str = "/var/lib/mender/device_type";

/// Hardware class label written into the client configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// 64-bit x86 machines (`x86_64`)
    GenericX86_64,
    /// Any ARM machine (`arm*`)
    GenericArmv6,
}

impl DeviceType {
    /// Map the output of `uname -m` to a device type
    pub fn from_machine(machine: &str) -> Result<Self> {
        if machine == "x86_64" {
            Ok(DeviceType::GenericX86_64)
        } else if machine.starts_with("arm") {
            Ok(DeviceType::GenericArmv6)
        } else {
            Err(Error::UnknownMachine {
                machine: machine.to_string(),
            })
        }
    }

    /// Label as the client expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::GenericX86_64 => "generic-x86_64",
            DeviceType::GenericArmv6 => "generic-armv6",
        }
    }

    /// Content of the device_type file
    pub fn config_line(&self) -> String {
        format!("device_type={}", self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(machine: &str) -> Result<Self> {
        Self::from_machine(machine)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
