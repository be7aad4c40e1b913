//! Well-known debug log ports.
//!
//! The device exposes one telnet-style log stream per subsystem. These are
//! the documented port assignments; arbitrary ports are accepted for
//! firmware builds that move them around.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A debug log port, either a named subsystem stream or a raw port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogPort {
    /// Main BrightScript console (8085)
    Main,
    /// SceneGraph debug stream (8089)
    SceneGraph,
    /// Task thread 1 (8090)
    Task1,
    /// Task thread 2 (8091)
    Task2,
    /// Task thread 3 (8092)
    Task3,
    /// Task threads 4 and up, multiplexed (8093)
    Task4X,
    /// Profiler stream (8080)
    Profiler,
    /// A raw port number
    Custom(u16),
}

impl LogPort {
    /// The TCP port this stream listens on.
    pub fn port(&self) -> u16 {
        match self {
            LogPort::Main => 8085,
            LogPort::SceneGraph => 8089,
            LogPort::Task1 => 8090,
            LogPort::Task2 => 8091,
            LogPort::Task3 => 8092,
            LogPort::Task4X => 8093,
            LogPort::Profiler => 8080,
            LogPort::Custom(port) => *port,
        }
    }

    /// The subsystem name, if this is a named stream.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            LogPort::Main => Some("main"),
            LogPort::SceneGraph => Some("sg"),
            LogPort::Task1 => Some("task1"),
            LogPort::Task2 => Some("task2"),
            LogPort::Task3 => Some("task3"),
            LogPort::Task4X => Some("task4x"),
            LogPort::Profiler => Some("profiler"),
            LogPort::Custom(_) => None,
        }
    }
}

impl fmt::Display for LogPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.port()),
            None => write!(f, "{}", self.port()),
        }
    }
}

impl FromStr for LogPort {
    type Err = Error;

    /// Parse a subsystem name (`main`, `sg`, `task1`...) or a raw port number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" => Ok(LogPort::Main),
            "sg" => Ok(LogPort::SceneGraph),
            "task1" => Ok(LogPort::Task1),
            "task2" => Ok(LogPort::Task2),
            "task3" => Ok(LogPort::Task3),
            "task4x" => Ok(LogPort::Task4X),
            "profiler" => Ok(LogPort::Profiler),
            other => other
                .parse::<u16>()
                .map(LogPort::Custom)
                .map_err(|_| Error::unknown_port(s)),
        }
    }
}
