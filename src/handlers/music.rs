//! Music playback requests

use crate::assets::{Announcement, Asset, AssetStore};
use crate::intent::SongRef;

/// The track to stream, or the "not found" announcement
#[must_use]
pub fn choose_track(assets: &AssetStore, song: &SongRef) -> Asset {
    let track = match song {
        SongRef::Random => assets.random_track(),
        SongRef::Named(name) => assets.find_track(name),
    };

    track.unwrap_or_else(|| {
        tracing::info!(song = %song, "no matching track");
        assets.announcement(Announcement::SongNotFound)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use crate::assets::AssetKind;

    #[test]
    fn named_random_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default().assets;
        config.dir = dir.path().to_path_buf();
        config.music_dir = dir.path().join("music");
        std::fs::create_dir_all(&config.music_dir).unwrap();
        let store = AssetStore::new(&config);

        // empty directory
        assert_eq!(
            choose_track(&store, &SongRef::Random),
            store.announcement(Announcement::SongNotFound)
        );

        std::fs::write(config.music_dir.join("lac_troi.wav"), b"x").unwrap();
        let named = choose_track(&store, &SongRef::Named("Lạc trôi".to_string()));
        assert_eq!(named.kind, AssetKind::Music);
        assert_eq!(choose_track(&store, &SongRef::Random), named);

        let missing = choose_track(&store, &SongRef::Named("không có".to_string()));
        assert_eq!(missing.kind, AssetKind::Announcement);
    }
}
