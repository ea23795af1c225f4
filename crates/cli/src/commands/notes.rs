use clap::Args;
use noteit_db::{connect_with_config, NoteFilter, NoteRepository, Page, SortKey, SqlNoteRepository};

use crate::commands::{load_config, runtime, CommandResult};

#[derive(Debug, Clone, Default, Args)]
pub struct NotesArgs {
    #[arg(long, help = "Only notes written by this author")]
    pub author: Option<String>,
    #[arg(long, help = "Only notes carrying this tag")]
    pub tag: Option<String>,
    #[arg(long, help = "Only notes with exactly this title")]
    pub title: Option<String>,
    #[arg(long, help = "Number of matching notes to skip")]
    pub skip: Option<u32>,
    #[arg(long, help = "Maximum number of notes to return")]
    pub limit: Option<u32>,
    #[arg(
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        help = "Sort keys such as `date` or `-date`, comma separated"
    )]
    pub sort: Vec<SortKey>,
}

impl NotesArgs {
    fn filter(&self) -> NoteFilter {
        NoteFilter {
            author: self.author.clone(),
            tag: self.tag.clone(),
            title: self.title.clone(),
            ..NoteFilter::all()
        }
    }
}

pub fn run(args: NotesArgs) -> CommandResult {
    let config = match load_config("notes") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("notes") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let repository = SqlNoteRepository::new(pool.clone());
        let notes = repository
            .get_many_sorted(&args.filter(), Page::new(args.skip, args.limit), &args.sort)
            .await
            .map_err(|error| ("query", error.to_string(), 6u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(notes)
    });

    match result {
        Ok(notes) => match serde_json::to_value(&notes) {
            Ok(data) => CommandResult::success_with_data(
                "notes",
                format!("{} notes matched", notes.len()),
                Some(data),
            ),
            Err(error) => CommandResult::failure("notes", "serialization", error.to_string(), 7),
        },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("notes", error_class, message, exit_code)
        }
    }
}
