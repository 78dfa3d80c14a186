// Copyright (c) 2023 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Persisted `SETTINGS` storage.
//!
//! Servers flag individual settings they want remembered across sessions.
//! The storage keeps those per `host:port`, and every new session to the
//! host replays them in its first frame with the persisted marker set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ylong_spdy::frame::{SettingEntry, Settings};

#[derive(Clone, Default)]
pub(crate) struct SpdySettingsStorage {
    inner: Arc<Mutex<HashMap<String, Vec<SettingEntry>>>>,
}

impl SpdySettingsStorage {
    // Replaces the stored set with the persist-flagged subset of `settings`.
    pub(crate) fn set(&self, authority: &str, settings: &Settings) {
        let persisted: Vec<SettingEntry> = settings
            .entries()
            .iter()
            .filter(|entry| entry.please_persist())
            .map(|entry| entry.as_persisted())
            .collect();

        let mut lock = self.inner.lock().unwrap();
        if persisted.is_empty() {
            lock.remove(authority);
        } else {
            lock.insert(authority.to_string(), persisted);
        }
    }

    pub(crate) fn get(&self, authority: &str) -> Vec<SettingEntry> {
        self.inner
            .lock()
            .unwrap()
            .get(authority)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod ut_settings {
    use ylong_spdy::frame::{SettingEntry, SettingId, Settings, SETTING_FLAG_PERSISTED};

    use crate::util::settings::SpdySettingsStorage;

    /// UT test cases for `SpdySettingsStorage`.
    ///
    /// # Brief
    /// 1. Stores a settings frame with one persist-flagged entry and one
    ///    plain entry.
    /// 2. Checks that only the flagged entry is kept, remarked as persisted.
    /// 3. Stores a frame without persist flags and checks the set clears.
    #[test]
    fn ut_settings_storage_persists_flagged_entries() {
        let storage = SpdySettingsStorage::default();
        assert!(storage.get("example.com:80").is_empty());

        let settings = Settings::build()
            .entry(SettingEntry::with_flags(
                SettingId::MaxConcurrentStreams,
                ylong_spdy::frame::SETTING_FLAG_PLEASE_PERSIST,
                128,
            ))
            .entry(SettingEntry::new(SettingId::RoundTripTime, 70))
            .finish();
        storage.set("example.com:80", &settings);

        let stored = storage.get("example.com:80");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id(), SettingId::MaxConcurrentStreams);
        assert_eq!(stored[0].value(), 128);
        assert_eq!(stored[0].flags(), SETTING_FLAG_PERSISTED);

        let plain = Settings::build()
            .entry(SettingEntry::new(SettingId::UploadBandwidth, 100))
            .finish();
        storage.set("example.com:80", &plain);
        assert!(storage.get("example.com:80").is_empty());

        assert!(storage.get("other.com:80").is_empty());
    }
}
