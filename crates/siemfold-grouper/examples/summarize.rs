use siemfold_core::{EventFields, RawEvent};
use siemfold_grouper::group;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args().nth(1);
    let reader: Box<dyn BufRead> = match path {
        Some(p) => Box::new(BufReader::new(File::open(p)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let fields = EventFields::default();
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(RawEvent::from_payload(serde_json::from_str(&line)?, &fields));
    }

    let grouping = group(events);
    for g in grouping.groups() {
        println!(
            "{}\t{}\t{}\t{}",
            g.count,
            g.members.len(),
            g.key.signature,
            g.key.message
        );
    }
    for event in grouping.ungrouped() {
        println!("1\t1\t{}\t{}\t<untimed>", event.signature, event.message);
    }

    Ok(())
}
