use std::fs;

use gitclone::vcs::ops;

fn main() {
    let dir = std::env::temp_dir().join(format!("gitclone-demo-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("failed to create demo dir");
    let repo_base = dir.parent().unwrap().to_path_buf();
    let repo_id = dir.file_name().unwrap().to_string_lossy().into_owned();

    ops::init(&repo_base, &repo_id, false).expect("init");

    fs::write(dir.join("quote.txt"), b"Shall I compare thee to a summer day.").expect("write file");
    ops::add(&repo_base, &repo_id, "quote.txt").expect("add");

    let commit = ops::commit(&repo_base, &repo_id, "first commit").expect("commit");
    println!("committed {} on {}: {}", commit.id, commit.branch, commit.message);

    ops::push(&repo_base, &repo_id, None).expect("push");
    let history = ops::log(&repo_base, &repo_id, "master", 10).expect("log");
    for commit in history {
        println!("{} {}", commit.id, commit.message);
    }
}
