use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use anyhow::Result;

/// Address family of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

/// IpNetwork is an address range (network + prefix length) with host bits cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNetwork {
    network: IpAddr,
    prefix_len: u8,
}

impl IpNetwork {
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self> {
        let max = max_prefix_len(&addr);
        if prefix_len > max {
            anyhow::bail!("Invalid prefix length /{} for {}", prefix_len, addr);
        }
        let network = from_bits(&addr, to_bits(&addr) & mask(max, prefix_len));
        Ok(Self { network, prefix_len })
    }

    pub fn family(&self) -> Family {
        match self.network {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    fn max_len(&self) -> u8 {
        max_prefix_len(&self.network)
    }

    fn first_bits(&self) -> u128 {
        to_bits(&self.network)
    }

    fn last_bits(&self) -> u128 {
        self.first_bits() | !mask(self.max_len(), self.prefix_len) & full(self.max_len())
    }

    /// Whether `other` lies entirely within this network
    pub fn contains(&self, other: &IpNetwork) -> bool {
        self.family() == other.family()
            && self.prefix_len <= other.prefix_len
            && self.first_bits() <= other.first_bits()
            && other.last_bits() <= self.last_bits()
    }

    pub fn overlaps(&self, other: &IpNetwork) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// First usable host address. Point-to-point and host routes have no
    /// reserved network address; IPv6 skips the subnet-router anycast address.
    pub fn first_host(&self) -> IpAddr {
        let host_bits = self.max_len() - self.prefix_len;
        if host_bits <= 1 {
            self.network
        } else {
            from_bits(&self.network, self.first_bits() + 1)
        }
    }

    /// Host literal with this network's prefix length, e.g. "192.0.2.1/24"
    pub fn first_host_cidr(&self) -> String {
        format!("{}/{}", self.first_host(), self.prefix_len)
    }
}

impl FromStr for IpNetwork {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr, len) = match s.split_once('/') {
            Some((addr, len)) => (addr, Some(len)),
            None => (s, None),
        };
        let addr: IpAddr = addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid network '{}': {}", s, e))?;
        let prefix_len = match len {
            Some(len) => len
                .parse::<u8>()
                .map_err(|e| anyhow::anyhow!("Invalid prefix length in '{}': {}", s, e))?,
            None => max_prefix_len(&addr),
        };
        IpNetwork::new(addr, prefix_len)
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

fn max_prefix_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn to_bits(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u32::from(*v4) as u128,
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

fn from_bits(family: &IpAddr, bits: u128) -> IpAddr {
    match family {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from(bits as u32)),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(bits)),
    }
}

/// All-ones value for an address width
fn full(width: u8) -> u128 {
    if width == 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Network mask for `prefix_len` within an address width
fn mask(width: u8, prefix_len: u8) -> u128 {
    let host_bits = width - prefix_len;
    if host_bits == 128 {
        0
    } else {
        full(width) & !((1u128 << host_bits) - 1)
    }
}
