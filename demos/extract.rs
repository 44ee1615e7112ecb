use std::env;

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: extract <image.png|image.jpg> [count]");
        std::process::exit(2);
    };

    let count = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(hueprint::DEFAULT_DESIRED_COLORS);

    match hueprint::extract_palette(&path, count) {
        Ok(colors) => {
            for color in colors {
                println!("{color}");
            }
        }
        Err(err) => {
            eprintln!("{path}: {err}");
            std::process::exit(1);
        }
    }
}
