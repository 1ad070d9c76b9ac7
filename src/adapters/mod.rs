//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements            | Connects to                    |
//! |-------------|-----------------------|--------------------------------|
//! | `eeprom`    | Eeprom                | NVS blob / RAM image           |
//! | `flash_log` | FlashMemory           | `reclog` partition / RAM model |
//! | `sim`       | NodeHardware (all)    | simulated sensor, RTC, radio   |
//! | `log_sink`  | EventSink             | Serial log output              |

pub mod eeprom;
pub mod flash_log;
pub mod log_sink;
pub mod sim;
