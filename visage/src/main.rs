mod encode_faces;
mod fit_began;
mod interpolate_faces;
mod model_setup;

use encode_faces::*;
use fit_began::*;
use interpolate_faces::*;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "VISAGE",
    long_about = "Boundary-equilibrium GAN for face images.\n\
		  Trains a generator/discriminator pair whose discriminator\n\
		  doubles as an autoencoder, then encodes real faces into the\n\
		  learned latent space and blends pairs of faces by spherical\n\
		  interpolation."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Train the adversarial autoencoder",
        long_about = "Train generator and discriminator with the\n\
		      boundary-equilibrium balance controller:\n\
		      (1) one Adam step per network per minibatch\n\
		      (2) proportional k_t update after every step\n\
		      (3) periodic sample grids and checkpoints.\n"
    )]
    Train(TrainArgs),

    #[command(
        about = "Autoencode a directory of face photos",
        long_about = "For every jpg/png under the data directory:\n\
		      detect and crop the face (full frame on failure),\n\
		      encode into the latent space, decode back and save\n\
		      the reconstruction as {basename}_encode.jpg.\n"
    )]
    Encode(EncodeArgs),

    #[command(
        about = "Blend two directories of face photos pairwise",
        long_about = "Pairs the sorted listings of two directories by\n\
		      position, spherically interpolates each pair in the\n\
		      latent space and saves the blended face plus a\n\
		      source | blend | source composite.\n"
    )]
    Interpolate(InterpolateArgs),
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.commands {
        Commands::Train(args) => {
            fit_began(args)?;
        }
        Commands::Encode(args) => {
            encode_faces(args)?;
        }
        Commands::Interpolate(args) => {
            interpolate_faces(args)?;
        }
    }
    Ok(())
}
