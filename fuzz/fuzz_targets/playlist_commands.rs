#![no_main]

use libfuzzer_sys::fuzz_target;
use sasplayer::core::{PlayerCore, TrackEnd};
use sasplayer::model::RepeatMode;
use std::path::PathBuf;

fuzz_target!(|data: &[u8]| {
    let mut core = PlayerCore::with_seed(data.len() as u64);
    let len = data.first().map_or(1, |byte| usize::from(*byte % 32));
    core.set_playlist(
        (0..len)
            .map(|idx| PathBuf::from(format!("track_{idx}.mp3")))
            .collect(),
    );

    for pair in data.chunks(2) {
        let arg = usize::from(pair.get(1).copied().unwrap_or(0));
        match pair[0] % 10 {
            0 => core.set_repeat(RepeatMode::Off),
            1 => core.set_repeat(RepeatMode::One),
            2 => core.set_repeat(RepeatMode::All),
            3 => {
                core.toggle_shuffle();
            }
            4 => {
                let _ = core.skip_next();
            }
            5 => {
                let _ = core.skip_previous();
            }
            6 => {
                if let TrackEnd::Play(path) = core.on_track_end() {
                    assert!(core.playlist.contains(&path));
                }
            }
            7 => {
                core.remove(&[arg % 40]);
            }
            8 => {
                core.move_row(arg % 40, arg / 8);
            }
            _ => {
                core.append(vec![PathBuf::from(format!("extra_{arg}.mp3"))]);
            }
        }

        if let Some(idx) = core.current {
            assert!(idx < core.len());
        }
        assert!(core.selected < core.len().max(1));
    }
});
