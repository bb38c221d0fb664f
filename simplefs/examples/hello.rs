use simplefs::{image, Volume};

pub fn main() {
    let tmp = tempfile::NamedTempFile::new().unwrap();

    // create a small volume, store a file and persist it
    let mut vol = Volume::new(64);
    vol.create("hello/world", "hi there").expect("should create");
    image::save(&vol, tmp.path()).expect("should save");

    let vol = image::load(tmp.path()).expect("should load");
    let file = vol.read("hello/world").unwrap();
    println!("{} blocks: {}", file.length, String::from_utf8_lossy(file.content));
    print!("{}", vol.tree());
}
