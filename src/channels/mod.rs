pub mod passive_monitor;

pub use passive_monitor::{
    PassiveWhatsAppMessage, append_passive_whatsapp_message, try_append_passive_whatsapp_message,
};
