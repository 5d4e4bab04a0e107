mod cli;

use isoforge::{ImageOptions, ImageWriter, Level, RockRidgeRevision, Variant};

fn main() -> Result<(), isoforge::error::Error> {
  pretty_env_logger::init();

  match cli::parse().command {
    cli::Command::Create {
      output,
      directory,
      level,
      plain,
      no_rock_ridge,
      joliet,
      volume_id,
      rrip,
    } => {
      let mut variants = Vec::new();
      if !no_rock_ridge {
        variants.push(Variant::RockRidge);
      }
      if plain || no_rock_ridge {
        variants.push(Variant::Iso9660);
      }
      if joliet {
        variants.push(Variant::Joliet);
      }

      let mut options = ImageOptions {
        level: Level::try_from(level)?,
        variants,
        rock_ridge: match rrip {
          cli::Revision::Rrip1991a => RockRidgeRevision::Rrip1991A,
          cli::Revision::Ieee1282 => RockRidgeRevision::Ieee1282,
        },
        ..Default::default()
      };
      if let Some(volume_id) = volume_id {
        options.volume.volume_identifier = volume_id;
      }

      let mut image = ImageWriter::new(std::fs::File::create(&output)?, options)?;
      isoforge::fs::capture(&mut image, &directory, "/")?;
      image.close_archive()?;

      log::info!("Wrote {}", output.display());
    }
  }

  Ok(())
}
