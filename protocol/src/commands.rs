//! Command id tables
//!
//! Application messages carried in ORIGINAL packets start with a 2-byte
//! command id. The ids are fixed by the server's protocol header; each
//! direction has its own namespace. The constants below are the single
//! source for those ids, and [`to_client`] / [`to_server`] expose the same
//! entries as a process-wide name/id lookup built on first use.

use std::collections::HashMap;
use std::sync::OnceLock;

macro_rules! command_table {
    ($(#[$meta:meta])* $module:ident { $($name:ident = $id:expr,)* }) => {
        $(#[$meta])*
        pub mod $module {
            $(pub const $name: u16 = $id;)*

            pub(super) const ENTRIES: &[(&str, u16)] = &[$((stringify!($name), $id),)*];
        }
    };
}

command_table!(
    /// Server -> client command ids
    toclient {
        HELLO = 0x02,
        AUTH_ACCEPT = 0x03,
        ACCEPT_SUDO_MODE = 0x04,
        DENY_SUDO_MODE = 0x05,
        ACCESS_DENIED = 0x0A,
        BLOCKDATA = 0x20,
        ADDNODE = 0x21,
        REMOVENODE = 0x22,
        INVENTORY = 0x27,
        TIME_OF_DAY = 0x29,
        CSM_RESTRICTION_FLAGS = 0x2A,
        PLAYER_SPEED = 0x2B,
        MEDIA_PUSH = 0x2C,
        CHAT_MESSAGE = 0x2F,
        ACTIVE_OBJECT_REMOVE_ADD = 0x31,
        ACTIVE_OBJECT_MESSAGES = 0x32,
        HP = 0x33,
        MOVE_PLAYER = 0x34,
        ACCESS_DENIED_LEGACY = 0x35,
        FOV = 0x36,
        DEATHSCREEN = 0x37,
        MEDIA = 0x38,
        NODEDEF = 0x3A,
        ANNOUNCE_MEDIA = 0x3C,
        ITEMDEF = 0x3D,
        PLAY_SOUND = 0x3F,
        STOP_SOUND = 0x40,
        PRIVILEGES = 0x41,
        INVENTORY_FORMSPEC = 0x42,
        DETACHED_INVENTORY = 0x43,
        SHOW_FORMSPEC = 0x44,
        MOVEMENT = 0x45,
        SPAWN_PARTICLE = 0x46,
        ADD_PARTICLESPAWNER = 0x47,
        HUDADD = 0x49,
        HUDRM = 0x4A,
        HUDCHANGE = 0x4B,
        HUD_SET_FLAGS = 0x4C,
        HUD_SET_PARAM = 0x4D,
        BREATH = 0x4E,
        SET_SKY = 0x4F,
        OVERRIDE_DAY_NIGHT_RATIO = 0x50,
        LOCAL_PLAYER_ANIMATIONS = 0x51,
        EYE_OFFSET = 0x52,
        DELETE_PARTICLESPAWNER = 0x53,
        CLOUD_PARAMS = 0x54,
        FADE_SOUND = 0x55,
        UPDATE_PLAYER_LIST = 0x56,
        MODCHANNEL_MSG = 0x57,
        MODCHANNEL_SIGNAL = 0x58,
        NODEMETA_CHANGED = 0x59,
        SET_SUN = 0x5A,
        SET_MOON = 0x5B,
        SET_STARS = 0x5C,
        MOVE_PLAYER_REL = 0x5D,
        SRP_BYTES_S_B = 0x60,
        FORMSPEC_PREPEND = 0x61,
        MINIMAP_MODES = 0x62,
        SET_LIGHTING = 0x63,
    }
);

command_table!(
    /// Client -> server command ids
    toserver {
        INIT = 0x02,
        INIT2 = 0x11,
        MODCHANNEL_JOIN = 0x17,
        MODCHANNEL_LEAVE = 0x18,
        MODCHANNEL_MSG = 0x19,
        PLAYERPOS = 0x23,
        GOTBLOCKS = 0x24,
        DELETEDBLOCKS = 0x25,
        INVENTORY_ACTION = 0x31,
        CHAT_MESSAGE = 0x32,
        DAMAGE = 0x35,
        PLAYERITEM = 0x37,
        RESPAWN = 0x38,
        INTERACT = 0x39,
        REMOVED_SOUNDS = 0x3A,
        NODEMETA_FIELDS = 0x3B,
        INVENTORY_FIELDS = 0x3C,
        REQUEST_MEDIA = 0x40,
        HAVE_MEDIA = 0x41,
        CLIENT_READY = 0x43,
        FIRST_SRP = 0x50,
        SRP_BYTES_A = 0x51,
        SRP_BYTES_M = 0x52,
        UPDATE_CLIENT_INFO = 0x53,
    }
);

/// Immutable bidirectional name <-> id mapping for one direction.
#[derive(Debug)]
pub struct CommandTable {
    by_name: HashMap<&'static str, u16>,
    by_id: HashMap<u16, &'static str>,
}

impl CommandTable {
    fn build(entries: &'static [(&'static str, u16)]) -> Self {
        Self {
            by_name: entries.iter().copied().collect(),
            by_id: entries.iter().map(|&(name, id)| (id, name)).collect(),
        }
    }

    pub fn id(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: u16) -> Option<&'static str> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

pub fn to_client() -> &'static CommandTable {
    static TABLE: OnceLock<CommandTable> = OnceLock::new();
    TABLE.get_or_init(|| CommandTable::build(toclient::ENTRIES))
}

pub fn to_server() -> &'static CommandTable {
    static TABLE: OnceLock<CommandTable> = OnceLock::new();
    TABLE.get_or_init(|| CommandTable::build(toserver::ENTRIES))
}
