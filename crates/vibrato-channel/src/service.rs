//! Named-method dispatch onto a playback session.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use vibrato_audio::PlaybackSession;
use vibrato_core::StreamId;

use crate::protocol::{Request, Response};
use crate::ChannelError;

#[derive(Deserialize)]
struct PlayFileArgs {
    file: String,
    name: String,
}

#[derive(Deserialize)]
struct PlayBufferArgs {
    buffer: Vec<u8>,
    format: String,
    name: String,
}

#[derive(Deserialize)]
struct StreamArgs {
    id: String,
}

#[derive(Deserialize)]
struct SeekArgs {
    id: String,
    position: i64,
}

/// Method surface over a shared [`PlaybackSession`].
#[derive(Clone)]
pub struct PlaybackService {
    session: Arc<PlaybackSession>,
}

impl PlaybackService {
    pub const fn new(session: Arc<PlaybackSession>) -> Self {
        Self { session }
    }

    /// Run one request and wrap the outcome for the wire.
    pub fn handle(&self, request: Request) -> Response {
        let Request { id, method, args } = request;
        let result = self.invoke(&method, args);
        if let Err(e) = &result {
            debug!("{method} failed: {e}");
        }
        Response::from_result(id, result)
    }

    /// Call `method` with its argument map.
    pub fn invoke(&self, method: &str, args: Value) -> Result<Value, ChannelError> {
        debug!("Invoking {method}");
        match method {
            "playFile" => {
                let args: PlayFileArgs = parse(method, args)?;
                let id = self.session.play_file(&args.file, &args.name)?;
                Ok(Value::String(id.to_string()))
            }
            "playBuffer" => {
                let args: PlayBufferArgs = parse(method, args)?;
                let id = self
                    .session
                    .play_buffer(args.buffer, &args.format, &args.name)?;
                Ok(Value::String(id.to_string()))
            }
            "listStreams" => {
                let streams: Map<String, Value> = self
                    .session
                    .list_streams()
                    .into_iter()
                    .map(|(id, name)| (id.to_string(), Value::String(name)))
                    .collect();
                Ok(Value::Object(streams))
            }
            "closeStream" => {
                let args: StreamArgs = parse(method, args)?;
                self.session.close_stream(args.id.parse()?)?;
                Ok(Value::Null)
            }
            "pauseStream" => {
                let args: StreamArgs = parse(method, args)?;
                self.session.pause_stream(args.id.parse()?)?;
                Ok(Value::Null)
            }
            "seekStream" => {
                let args: SeekArgs = parse(method, args)?;
                let id: StreamId = args.id.parse()?;
                self.session.seek_stream(id, args.position)?;
                Ok(Value::Null)
            }
            "streamInfo" => {
                let args: StreamArgs = parse(method, args)?;
                let info = self.session.stream_info(args.id.parse()?)?;
                Ok(serde_json::to_value(info).map_err(vibrato_core::Error::from)?)
            }
            other => Err(ChannelError::UnknownMethod(other.to_string())),
        }
    }
}

fn parse<T: DeserializeOwned>(method: &str, args: Value) -> Result<T, ChannelError> {
    serde_json::from_value(args).map_err(|source| ChannelError::InvalidArguments {
        method: method.to_string(),
        source,
    })
}
