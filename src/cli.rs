// src/cli.rs

use clap::{value_parser, Arg, ArgAction, Command};

fn page_arg() -> Arg {
    Arg::new("page")
        .long("page")
        .short('p')
        .help("Page number, starting at 1")
        .value_name("N")
        .value_parser(value_parser!(usize))
        .default_value("1")
}

fn video_arg() -> Arg {
    Arg::new("video")
        .help("Video ID or any YouTube video URL")
        .required(true)
        .index(1)
}

/// Build the command-line interface for the application
pub fn build_cli() -> Command {
    Command::new("tubeview")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Ibrahim Mohamed")
        .about("Browse YouTube and play videos through yt-dlp and mpv")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("search")
                .about("Search for videos")
                .arg(
                    Arg::new("query")
                        .help("Search terms")
                        .required(true)
                        .num_args(1..)
                        .index(1),
                )
                .arg(page_arg()),
        )
        .subcommand(
            Command::new("trending")
                .about("Show the trending feed")
                .arg(page_arg()),
        )
        .subcommand(
            Command::new("channel")
                .about("List a channel's uploads or playlists")
                .arg(
                    Arg::new("channel")
                        .help("Channel handle (@name), ID (UC...) or URL")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("playlists")
                        .long("playlists")
                        .help("List playlists instead of uploads")
                        .action(ArgAction::SetTrue),
                )
                .arg(page_arg()),
        )
        .subcommand(
            Command::new("playlist")
                .about("List the videos of a playlist")
                .arg(
                    Arg::new("playlist")
                        .help("Playlist ID or a URL containing list=")
                        .required(true)
                        .index(1),
                )
                .arg(page_arg()),
        )
        .subcommand(
            Command::new("info")
                .about("Show details of a video")
                .arg(video_arg()),
        )
        .subcommand(
            Command::new("formats")
                .about("Show the quality options and the chosen streams")
                .arg(video_arg()),
        )
        .subcommand(
            Command::new("play")
                .about("Play a video in the external player")
                .arg(video_arg())
                .arg(
                    Arg::new("quality")
                        .long("quality")
                        .short('q')
                        .help("Resolution ceiling, e.g. 720")
                        .value_name("HEIGHT")
                        .value_parser(value_parser!(u32).range(144..)),
                )
                .arg(
                    Arg::new("no-upgrade")
                        .long("no-upgrade")
                        .help("Stay on the fast-start stream")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("thumbnail")
                .about("Fetch a video's thumbnail into the image cache")
                .arg(video_arg()),
        )
        .subcommand(
            Command::new("cache")
                .about("Inspect or clean the caches")
                .subcommand_required(true)
                .subcommand(Command::new("stats").about("Show cache sizes"))
                .subcommand(Command::new("clear").about("Delete all cached formats and images"))
                .subcommand(Command::new("prune").about("Delete expired entries")),
        )
        .subcommand(Command::new("deps").about("Check yt-dlp and the player"))
}
