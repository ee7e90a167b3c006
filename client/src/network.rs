//! Game command API on top of the connection
//!
//! [`Client`] runs a dispatch task that consumes the payloads queued by the
//! receive loop and applies them to the local [`PlayerState`], and exposes
//! the outbound game commands. Outbound commands never wait for a reply;
//! movement updates the local state optimistically.

use crate::config::{bounded, ClientConfig, MessageCallback};
use crate::connection::{Connection, Inbound};
use crate::error::{ClientError, ClientResult};
use crate::game::{Angle, PlayerState, Position};
use crate::trace::LogTrace;
use bytes::Bytes;
use log::{debug, error, info, warn};
use protocol::commands::to_client;
use protocol::{ClientCommand, Codec, ServerCommand};
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

/// Key bitmask sent with position updates when none is given.
pub const DEFAULT_KEYS: u32 = 0x01;

/// State shared between the API and the dispatch task.
pub(crate) struct Shared {
    player: Mutex<PlayerState>,
    on_message: RwLock<Option<MessageCallback>>,
    access_denied: Mutex<Option<String>>,
    /// One permit per MOVE_PLAYER or ACCESS_DENIED received
    ready: Semaphore,
}

impl Shared {
    pub(crate) fn new(on_message: Option<MessageCallback>) -> Self {
        Self {
            player: Mutex::new(PlayerState::new()),
            on_message: RwLock::new(on_message),
            access_denied: Mutex::new(None),
            ready: Semaphore::new(0),
        }
    }

    fn player(&self) -> MutexGuard<'_, PlayerState> {
        self.player.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_access_denied(&self) -> Option<String> {
        self.access_denied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Applies one server command to local state. Returns a command to send
    /// back when the server expects an answer.
    pub(crate) fn apply(&self, command: ServerCommand) -> Option<ClientCommand> {
        match command {
            ServerCommand::MovePlayer {
                position,
                pitch,
                yaw,
            } => {
                self.player().apply_server_move(position, pitch, yaw);
                debug!("Server moved us to {:?}", position);
                self.ready.add_permits(1);
            }
            ServerCommand::ChatMessage(message) => {
                let callback = self
                    .on_message
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                match callback {
                    Some(callback) => callback(message),
                    None => debug!("Chat: {}", message),
                }
            }
            ServerCommand::Hp(hp) => {
                self.player().set_hp(hp);
                debug!("HP is now {}", hp);
            }
            ServerCommand::Deathscreen => {
                info!("Died, respawning");
                return Some(ClientCommand::Respawn);
            }
            ServerCommand::AccessDenied { reason } => {
                warn!("Access denied: {}", reason);
                *self.access_denied.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason);
                self.ready.add_permits(1);
            }
            ServerCommand::Ignored(id) => {
                debug!("Ignoring {}", to_client().name(id).unwrap_or("command"));
            }
            ServerCommand::Unknown(id) => {
                match to_client().name(id) {
                    Some(name) => warn!("Unhandled command {} ({:#06x})", name, id),
                    None => warn!("Unknown command type {:#06x}", id),
                }
            }
        }
        None
    }
}

pub struct Client {
    connection: Arc<Connection>,
    shared: Arc<Shared>,
    receiver: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl Client {
    /// Connects and waits until the server has placed our character.
    ///
    /// Fails with [`ClientError::AccessDenied`] if the server refuses us,
    /// either during the handshake or while the character is being set up.
    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        let codec = if config.trace {
            Codec::with_hook(Arc::new(LogTrace))
        } else {
            Codec::new()
        };

        let (connection, Inbound { queue, task }) = Connection::connect(&config, codec).await?;
        let shared = Arc::new(Shared::new(config.on_message.clone()));
        let dispatcher = spawn_dispatcher(Arc::clone(&connection), Arc::clone(&shared), queue);

        let client = Client {
            connection,
            shared,
            receiver: task,
            dispatcher,
        };

        // Until the first MOVE_PLAYER we don't know where we are, and
        // relative movement would be meaningless.
        match bounded(config.handshake_timeout, client.shared.ready.acquire()).await? {
            Ok(permit) => permit.forget(),
            Err(_) => return Err(ClientError::ConnectionClosed),
        }

        if let Some(reason) = client.shared.take_access_denied() {
            return Err(ClientError::AccessDenied { reason });
        }

        info!("Ready at {:?}", client.player().position);
        Ok(client)
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn peer_id(&self) -> u16 {
        self.connection.peer_id()
    }

    /// Snapshot of the character's current state.
    pub fn player(&self) -> PlayerState {
        *self.shared.player()
    }

    pub fn set_on_message<F>(&self, callback: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        *self
            .shared
            .on_message
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(callback));
    }

    /// Sends a global chat message.
    pub async fn say(&self, message: impl Display) -> ClientResult<()> {
        self.connection
            .send_command(&ClientCommand::ChatMessage(message.to_string()))
            .await?;
        Ok(())
    }

    /// Resurrects the dead character.
    pub async fn respawn(&self) -> ClientResult<()> {
        self.connection.send_command(&ClientCommand::Respawn).await?;
        Ok(())
    }

    /// Damages the character by `amount` half-hearts; 20 is a complete suicide.
    pub async fn damage(&self, amount: u8) -> ClientResult<()> {
        self.connection
            .send_command(&ClientCommand::Damage(amount))
            .await?;
        Ok(())
    }

    /// Moves to an absolute position and view direction.
    pub async fn teleport(&self, position: Position, angle: Angle) -> ClientResult<()> {
        self.teleport_with(position, Position::default(), angle, DEFAULT_KEYS)
            .await
    }

    pub async fn teleport_with(
        &self,
        position: Position,
        speed: Position,
        angle: Angle,
        keys: u32,
    ) -> ClientResult<()> {
        self.connection
            .send_command(&ClientCommand::PlayerPos {
                position: position.to_array(),
                speed: speed.to_array(),
                pitch: angle.pitch,
                yaw: angle.yaw,
                keys,
            })
            .await?;

        let mut player = self.shared.player();
        player.position = position;
        player.angle = angle;
        Ok(())
    }

    /// Moves relative to the current position and view direction.
    pub async fn move_by(&self, delta_position: Position, delta_angle: Angle) -> ClientResult<()> {
        let (position, angle) = self.player().moved(delta_position, delta_angle);
        self.teleport(position, angle).await
    }

    /// Faces a different direction; negative degrees turn the other way.
    pub async fn turn(&self, degrees: f64) -> ClientResult<()> {
        let player = self.player();
        self.teleport(player.position, player.turned(degrees)).await
    }

    /// Moves `distance` blocks forward in the direction the character faces.
    pub async fn walk(&self, distance: f64) -> ClientResult<()> {
        let delta = self.player().walk_delta(distance);
        self.move_by(delta, Angle::default()).await
    }

    /// Removes the character from the world.
    pub async fn disconnect(&self) -> ClientResult<()> {
        self.connection.disconnect().await
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.receiver.abort();
        self.dispatcher.abort();
    }
}

fn spawn_dispatcher(
    connection: Arc<Connection>,
    shared: Arc<Shared>,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = queue.recv().await {
            let command = match ServerCommand::decode(connection.codec(), payload) {
                Ok(command) => command,
                Err(e) => {
                    warn!("Dropping malformed command: {}", e);
                    continue;
                }
            };

            if let Some(reply) = shared.apply(command) {
                if let Err(e) = connection.send_command(&reply).await {
                    error!("Failed to send {:?}: {}", reply, e);
                }
            }
        }

        debug!("Dispatch queue closed");
        shared.ready.close();
    })
}
