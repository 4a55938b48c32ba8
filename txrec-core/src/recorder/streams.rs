//! Recording streams owned by one recorder

use tracing::debug;

use crate::error::Result;
use crate::recording::{TxDb, TxGenerator, TxStream};
use crate::transport::Command;

pub(crate) const START_DELAY: &str = "start_delay";
pub(crate) const END_DELAY: &str = "end_delay";
pub(crate) const TLM_PHASE: &str = "tlm_phase";
pub(crate) const TLM_PHASE_RETURN: &str = "tlm_phase[return_path]";

/// One generator per command, indexed by [`Command::index`]
pub(crate) type CommandGenerators = [TxGenerator; 3];

fn command_generators(
    stream: &TxStream,
    begin: Option<&str>,
    end: Option<&str>,
) -> Result<CommandGenerators> {
    let [read, write, ignore] = Command::ALL;
    Ok([
        stream.generator(read.as_str(), begin, end)?,
        stream.generator(write.as_str(), begin, end)?,
        stream.generator(ignore.as_str(), begin, end)?,
    ])
}

pub(crate) struct TimedGenerators {
    pub blocking: CommandGenerators,
    pub request: TxGenerator,
    pub response: TxGenerator,
}

pub(crate) struct DmiGenerators {
    pub get: TxGenerator,
    pub invalidate: TxGenerator,
}

/// Streams `<name>_bl`, `<name>_nb` and, when enabled at creation,
/// `<name>_bl_timed`, `<name>_nb_timed` and `<name>_dmi`
pub(crate) struct RecordingStreams {
    pub blocking: CommandGenerators,
    pub nb_fw: TxGenerator,
    pub nb_bw: TxGenerator,
    pub timed: Option<TimedGenerators>,
    pub dmi: Option<DmiGenerators>,
    names: Vec<String>,
}

impl RecordingStreams {
    pub fn open(
        db: &TxDb,
        name: &str,
        protocol: &str,
        timed: bool,
        dmi: bool,
    ) -> Result<Self> {
        let mut names = Vec::new();
        let mut open = |suffix: &str, tag: &str| -> Result<TxStream> {
            let stream = db.open_stream(
                &format!("{}_{}", name, suffix),
                &format!("[TLM][{}]{}", protocol, tag),
            )?;
            names.push(stream.name().to_string());
            Ok(stream)
        };

        let bl = open("bl", "[b]")?;
        let blocking = command_generators(&bl, Some(START_DELAY), Some(END_DELAY))?;

        let timed_bl = if timed { Some(open("bl_timed", "[b][timed]")?) } else { None };

        let nb = open("nb", "[nb]")?;
        let nb_fw = nb.generator("fw", Some(TLM_PHASE), Some(TLM_PHASE_RETURN))?;
        let nb_bw = nb.generator("bw", Some(TLM_PHASE), Some(TLM_PHASE_RETURN))?;

        let timed = match timed_bl {
            Some(bl_timed) => {
                let nb_timed = open("nb_timed", "[nb][timed]")?;
                Some(TimedGenerators {
                    blocking: command_generators(&bl_timed, Some("command"), Some("response_status"))?,
                    request: nb_timed.generator("request", None, None)?,
                    response: nb_timed.generator("response", None, None)?,
                })
            }
            None => None,
        };

        let dmi = if dmi {
            let stream = open("dmi", "[dmi]")?;
            Some(DmiGenerators {
                get: stream.generator("get", Some("trans"), Some("dmi_data"))?,
                invalidate: stream.generator("invalidate", Some("start_addr"), Some("end_addr"))?,
            })
        } else {
            None
        };

        debug!(recorder = %name, streams = ?names, "opened recording streams");
        Ok(Self {
            blocking,
            nb_fw,
            nb_bw,
            timed,
            dmi,
            names,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}
