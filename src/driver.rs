use crate::{
    config::Config,
    error::{Error, Result},
    hue::shift_hue,
    sequencer::{Frame, Sequencer},
    upload::{PhotoUploader, encode_png},
};
use image::{DynamicImage, ImageReader};
use std::{fs, path::Path};

/// Where the rendered PNG ends up.
pub enum Sink<'a> {
    Upload(&'a dyn PhotoUploader),
    /// Dry run: write the PNG locally instead of publishing it.
    File(&'a Path),
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// Renders this run's frame and hands it to `sink`.
///
/// For uploads the frame index is saved before anything is sent, so a failed
/// upload is not retried next time; the cycle simply moves on. A dry run only
/// peeks at the sequence and never writes the state file.
pub fn publish(config: &Config, sequencer: &Sequencer, sink: Sink<'_>) -> Result<Frame> {
    let image = load_image(&config.image)?;
    let frame = match sink {
        Sink::Upload(_) => sequencer.advance()?,
        Sink::File(_) => sequencer.peek(),
    };

    log::info!(
        "rendering {frame} from {} ({}x{})",
        config.image.display(),
        image.width(),
        image.height()
    );

    let shifted = shift_hue(&image, frame.shift(), config.quantize);
    let png = encode_png(&shifted)?;

    match sink {
        Sink::Upload(uploader) => {
            log::debug!("uploading {} bytes via {}", png.len(), uploader.name());
            uploader.upload(png).map_err(|e| Error::Upload {
                transport: uploader.name(),
                error: Box::new(e),
            })?;
        }
        Sink::File(path) => fs::write(path, png)?,
    }

    Ok(frame)
}
