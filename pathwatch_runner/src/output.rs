use log::warn;

use pathwatch::Event;

/// One line per event on stdout. JSON keeps the canonical field order;
/// the human form is `time effect path_type path [-> associated]`.
pub fn print_event(event: &Event, json: bool) {
	if json {
		match serde_json::to_string(event) {
			Ok(line) => println!("{}", line),
			Err(e) => warn!("Unable to render event: {}", e),
		}
	} else {
		match &event.associated_path_name {
			Some(associated) => println!(
				"{} {} {} {} -> {}",
				event.effect_time,
				event.effect_type,
				event.path_type,
				event.path_name.display(),
				associated.display()
			),
			None => println!(
				"{} {} {} {}",
				event.effect_time,
				event.effect_type,
				event.path_type,
				event.path_name.display()
			),
		}
	}
}
