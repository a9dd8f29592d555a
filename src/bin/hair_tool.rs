use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use glam::*;

use hair_splat_editor as hs;

/// The command line arguments.
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "\
    Edit Gaussian splatting hair avatars from the command line.\n\
    \n\
    Avatars are hair splat PLY files with n_strands and n_gaussians_per_strand metadata. \
    Animation frames are read from the frame cache folder next to each avatar.\
    "
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load avatars and print their windows, layout and strands.
    Info {
        /// Paths to the .ply files.
        models: Vec<PathBuf>,
    },
    /// Cut the hair under a screen point, seen from the default camera.
    Cut {
        /// Path to the .ply file.
        #[arg(short, long)]
        model: PathBuf,
        /// Path to the output .ply file.
        #[arg(short, long)]
        output: PathBuf,
        /// The cursor X in pixels.
        #[arg(short)]
        x: f32,
        /// The cursor Y in pixels.
        #[arg(short)]
        y: f32,
        /// The viewport width in pixels.
        #[arg(long, default_value_t = 1280.0)]
        width: f32,
        /// The viewport height in pixels.
        #[arg(long, default_value_t = 720.0)]
        height: f32,
        /// The cutting radius.
        #[arg(short, long, default_value_t = 0.2)]
        radius: f32,
    },
    /// Pose the hair at a frame with curls.
    Curl {
        /// Path to the .ply file.
        #[arg(short, long)]
        model: PathBuf,
        /// Path to the output .ply file.
        #[arg(short, long)]
        output: PathBuf,
        /// The wave frequency.
        #[arg(short, long, default_value_t = 0.0)]
        frequency: f32,
        /// The wave amplitude.
        #[arg(short, long, default_value_t = 0.0)]
        amplitude: f32,
        /// The animation frame.
        #[arg(long, default_value_t = 0)]
        frame: u32,
    },
    /// Pack a frame cache folder into a single frames.npy.
    PackFrames {
        /// Path to the frame folder.
        folder: PathBuf,
        /// The rotation format of the frame files.
        #[arg(long, value_enum, default_value_t = RotFormat::Mat)]
        rot_format: RotFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RotFormat {
    /// Rotation matrices.
    Mat,
    /// Quaternions.
    Quat,
}

impl From<RotFormat> for hs::RotationFormat {
    fn from(format: RotFormat) -> Self {
        match format {
            RotFormat::Mat => hs::RotationFormat::Matrix,
            RotFormat::Quat => hs::RotationFormat::Quaternion,
        }
    }
}

fn main() -> Result<(), hs::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::Info { models } => info(&models),
        Command::Cut {
            model,
            output,
            x,
            y,
            width,
            height,
            radius,
        } => {
            let viewport = hs::Viewport::new(Vec2::new(width, height));
            cut(&model, &output, Vec2::new(x, y), &viewport, radius)
        }
        Command::Curl {
            model,
            output,
            frequency,
            amplitude,
            frame,
        } => curl(
            &model,
            &output,
            frame,
            hs::WaveParams::new(frequency, amplitude),
        ),
        Command::PackFrames { folder, rot_format } => {
            hs::FramePacker::new(folder, rot_format.into()).pack_to_file()?;
            Ok(())
        }
    }
}

fn info(models: &[PathBuf]) -> Result<(), hs::Error> {
    let mut scene = hs::AvatarScene::new();
    for model in models {
        scene.load_avatar(model)?;
    }

    println!("Buffer: {} gaussians", scene.buffer().len());
    for (i, avatar) in scene.avatars().iter().enumerate() {
        let window = scene.buffer().window(i).ok_or(hs::Error::AvatarNotFound(i))?;
        println!(
            "{i}: {} window {window:?} displacement {:.4} strands {} x {} head {}",
            avatar.name,
            scene.displacement(i),
            avatar.strands.strand_count,
            avatar.strands.gaussians_per_strand,
            avatar.head().len(),
        );
    }

    Ok(())
}

fn cut(
    model: &Path,
    output: &Path,
    cursor: Vec2,
    viewport: &hs::Viewport,
    radius: f32,
) -> Result<(), hs::Error> {
    let mut scene = hs::AvatarScene::new();
    let index = scene.load_avatar(model)?;

    let camera = hs::Camera::default();
    let ray = hs::Ray::from_cursor(&camera, cursor, viewport);

    let session = hs::EditorSession {
        selected: Some(index),
        mode: hs::EditMode::Cutting,
        cutting_radius: radius,
        ..Default::default()
    };

    let cut = scene.cut(&session, &ray)?;
    log::info!("Cut {cut} gaussians");

    scene.export_to_file(index, output)
}

fn curl(
    model: &Path,
    output: &Path,
    frame: u32,
    wave: hs::WaveParams,
) -> Result<(), hs::Error> {
    let mut scene = hs::AvatarScene::new();
    let index = scene.load_avatar(model)?;

    let session = hs::EditorSession {
        selected: Some(index),
        ..Default::default()
    };

    scene.set_frame(&session, frame)?;
    scene.set_wave(&session, wave)?;

    scene.export_to_file(index, output)
}
