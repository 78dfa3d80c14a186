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

//! Per-stream flow-control windows.

/// The window this endpoint is allowed to send into. It can go negative
/// when the peer shrinks the initial window size below what is already in
/// flight.
pub(crate) struct SendWindow {
    size: i32,
}

impl SendWindow {
    pub(crate) fn new(size: i32) -> Self {
        Self { size }
    }

    pub(crate) fn size_available(&self) -> u32 {
        if self.size < 0 {
            0
        } else {
            self.size as u32
        }
    }

    /// Shrinks the window without sending, used when the peer lowers the
    /// initial window size.
    pub(crate) fn reduce_size(&mut self, size: u32) {
        self.size -= size as i32;
    }

    /// Grows the window. Fails when the result would not fit in 31 bits.
    pub(crate) fn increase_size(&mut self, size: u32) -> Result<(), ()> {
        let (curr, overflow) = self.size.overflowing_add(size as i32);
        if overflow || curr < self.size {
            return Err(());
        }
        self.size = curr;
        Ok(())
    }

    pub(crate) fn send_data(&mut self, size: u32) {
        self.size -= size as i32;
    }
}

/// The window granted to the peer. `notification` is what the peer has been
/// told, `released` counts consumed bytes not yet returned as credit.
pub(crate) struct RecvWindow {
    size: i32,
    notification: i32,
    released: i32,
}

impl RecvWindow {
    pub(crate) fn new(size: i32) -> Self {
        Self {
            size,
            notification: size,
            released: 0,
        }
    }

    pub(crate) fn notification_available(&self) -> u32 {
        if self.notification < 0 {
            0
        } else {
            self.notification as u32
        }
    }

    pub(crate) fn recv_data(&mut self, size: u32) {
        self.notification -= size as i32;
    }

    /// Records `size` consumed bytes. Returns the credit to send as a
    /// `WINDOW_UPDATE` once more than half the window is waiting, batching
    /// small reads into one frame.
    pub(crate) fn release_data(&mut self, size: u32) -> Option<u32> {
        self.released += size as i32;
        if self.released * 2 > self.size {
            let credit = self.released;
            self.notification += credit;
            self.released = 0;
            Some(credit as u32)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod ut_window {
    use crate::util::spdy::window::{RecvWindow, SendWindow};

    /// UT test cases for `SendWindow`.
    ///
    /// # Brief
    /// 1. Creates a `SendWindow` and checks the available size.
    /// 2. Sends data and checks the window shrinks.
    /// 3. Reduces the size below zero and checks availability clamps to 0.
    /// 4. Increases the size back and checks availability recovers.
    #[test]
    fn ut_send_window_sizing() {
        let mut window = SendWindow::new(10);
        assert_eq!(window.size_available(), 10);

        window.send_data(4);
        assert_eq!(window.size_available(), 6);

        window.reduce_size(10);
        assert_eq!(window.size_available(), 0);
        assert_eq!(window.size, -4);

        assert!(window.increase_size(14).is_ok());
        assert_eq!(window.size_available(), 10);
    }

    /// UT test cases for `SendWindow::increase_size` overflow.
    ///
    /// # Brief
    /// 1. Creates a `SendWindow` near the 31-bit limit.
    /// 2. Increases past the limit and checks the call fails without
    ///    changing the window.
    #[test]
    fn ut_send_window_increase_overflow() {
        let mut window = SendWindow::new(i32::MAX - 1);
        assert!(window.increase_size(2).is_err());
        assert_eq!(window.size, i32::MAX - 1);
    }

    /// UT test cases for `RecvWindow`.
    ///
    /// # Brief
    /// 1. Creates a `RecvWindow` and receives data into it.
    /// 2. Releases less than half the window and checks no credit is due.
    /// 3. Releases past the half mark and checks the whole released amount
    ///    comes back as one credit.
    #[test]
    fn ut_recv_window_release_batches() {
        let mut window = RecvWindow::new(100);
        window.recv_data(80);
        assert_eq!(window.notification_available(), 20);

        assert_eq!(window.release_data(30), None);
        assert_eq!(window.released, 30);

        assert_eq!(window.release_data(30), Some(60));
        assert_eq!(window.released, 0);
        assert_eq!(window.notification_available(), 80);
    }
}
