// Copyright (C) 2022-2024 Webb Technologies Inc.
//
// Tangle is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Tangle is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should receive a copy of the GNU General Public License
// If not, see <http://www.gnu.org/licenses/>.

// build info shown by `GET /api/v1/info`, missing outside of a git checkout.
fn main() {
    if let Ok(branch) = build_data::get_git_branch() {
        println!("cargo:rustc-env=GIT_BRANCH={branch}");
    }
    if let Ok(commit) = build_data::get_git_commit() {
        println!("cargo:rustc-env=GIT_COMMIT={commit}");
    }
    if let Ok(dirty) = build_data::get_git_dirty() {
        println!("cargo:rustc-env=GIT_DIRTY={dirty}");
    }
    if let Ok(time) = build_data::get_source_time() {
        println!(
            "cargo:rustc-env=SOURCE_TIMESTAMP={}",
            build_data::format_timestamp(time)
        );
    }
    build_data::no_debug_rebuilds();
}
