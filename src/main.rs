mod entry;

use ndt7_server::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
